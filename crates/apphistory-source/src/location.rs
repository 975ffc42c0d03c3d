//! Locations, location descriptors and path helpers.
//!
//! A [`Location`] is what a history source hands out: a fully resolved
//! entry with pathname, search, hash, an opaque JSON `state` and the key the
//! source assigned. A [`LocationDescriptor`] is what callers hand in: any of
//! those parts may be missing and are filled in against the current location
//! when the source resolves it.
//!
//! ## Path Rendering
//!
//! | Input | `create_path` |
//! |-------|---------------|
//! | `("", "", "")` | `/` |
//! | `("/a", "x=1", "top")` | `/a?x=1#top` |
//! | `("/a", "?", "#")` | `/a` |
//!
//! Equality for lookup purposes is defined over the rendered href, never over
//! the whole structure: two entries with the same href but different state or
//! key are the same place.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The last operation applied to a history source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// A new entry was appended after the current one.
    Push,
    /// The source moved through existing entries (back, forward, go).
    Pop,
    /// The current entry was overwritten.
    Replace,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::Replace => "REPLACE",
        };
        f.write_str(name)
    }
}

/// A resolved history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Absolute pathname, always starting with `/`.
    pub pathname: String,
    /// Query string including its leading `?`, or empty.
    pub search: String,
    /// Fragment including its leading `#`, or empty.
    pub hash: String,
    /// Opaque entry state. `Value::Null` means "no state".
    #[serde(default)]
    pub state: Value,
    /// Key assigned by the source when the entry was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Location {
    /// Creates a location at `pathname` with no search, hash, state or key.
    pub fn new(pathname: impl Into<String>) -> Self {
        Self {
            pathname: pathname.into(),
            search: String::new(),
            hash: String::new(),
            state: Value::Null,
            key: None,
        }
    }

    /// Returns a copy carrying `state` instead of the current one.
    #[must_use]
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    /// Returns a copy with the key removed.
    #[must_use]
    pub fn without_key(mut self) -> Self {
        self.key = None;
        self
    }

    /// Renders pathname, search and hash into a path string.
    #[must_use]
    pub fn href(&self) -> String {
        create_path(&self.pathname, &self.search, &self.hash)
    }
}

/// A partial location handed to `push`/`replace` or used as a lookup target.
///
/// Build one from a path string (parsed into its parts), from a resolved
/// [`Location`], or field by field.
///
/// ```rust
/// use apphistory_source::LocationDescriptor;
/// use serde_json::json;
///
/// let to = LocationDescriptor::path("/inbox?page=2#top").with_state(json!({"draft": 1}));
/// assert_eq!(to.pathname.as_deref(), Some("/inbox"));
/// assert_eq!(to.search.as_deref(), Some("?page=2"));
/// assert_eq!(to.hash.as_deref(), Some("#top"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationDescriptor {
    /// Pathname; missing or empty inherits the current pathname, relative
    /// pathnames resolve against it.
    #[serde(default)]
    pub pathname: Option<String>,
    /// Query string, with or without its leading `?`.
    #[serde(default)]
    pub search: Option<String>,
    /// Fragment, with or without its leading `#`.
    #[serde(default)]
    pub hash: Option<String>,
    /// Entry state.
    #[serde(default)]
    pub state: Value,
    /// Requested key. Sources are free to assign their own.
    #[serde(default)]
    pub key: Option<String>,
}

impl LocationDescriptor {
    /// Parses a path string such as `/a/b?x=1#frag`.
    pub fn path(path: &str) -> Self {
        let (pathname, search, hash) = parse_path(path);
        Self {
            pathname: Some(pathname),
            search: Some(search),
            hash: Some(hash),
            state: Value::Null,
            key: None,
        }
    }

    /// Replaces the state carried by this descriptor.
    #[must_use]
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    /// Sets only the fragment.
    #[must_use]
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Sets only the query string.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Renders the descriptor without resolving it against any location.
    ///
    /// A missing pathname renders as `/`.
    #[must_use]
    pub fn href(&self) -> String {
        create_path(
            self.pathname.as_deref().unwrap_or_default(),
            self.search.as_deref().unwrap_or_default(),
            self.hash.as_deref().unwrap_or_default(),
        )
    }

    /// Turns the descriptor into a location, filling gaps from `current`.
    ///
    /// `current == None` means there is nothing to inherit from, so a missing
    /// pathname becomes `/`.
    pub fn resolve(self, key: Option<String>, current: Option<&Location>) -> Location {
        let search = prefixed(self.search.as_deref().unwrap_or_default(), '?');
        let hash = prefixed(self.hash.as_deref().unwrap_or_default(), '#');

        let pathname = match (self.pathname.filter(|p| !p.is_empty()), current) {
            (Some(p), Some(current)) if !p.starts_with('/') => {
                resolve_pathname(&p, &current.pathname)
            }
            (Some(p), _) => p,
            (None, Some(current)) => current.pathname.clone(),
            (None, None) => "/".to_string(),
        };

        Location {
            pathname,
            search,
            hash,
            state: self.state,
            key: key.or(self.key),
        }
    }
}

impl From<&str> for LocationDescriptor {
    fn from(path: &str) -> Self {
        Self::path(path)
    }
}

impl From<String> for LocationDescriptor {
    fn from(path: String) -> Self {
        Self::path(&path)
    }
}

impl From<Location> for LocationDescriptor {
    fn from(location: Location) -> Self {
        Self {
            pathname: Some(location.pathname),
            search: Some(location.search),
            hash: Some(location.hash),
            state: location.state,
            key: location.key,
        }
    }
}

impl From<&Location> for LocationDescriptor {
    fn from(location: &Location) -> Self {
        Self::from(location.clone())
    }
}

/// Renders pathname, search and hash into a path string.
///
/// An empty pathname renders as `/`. Search and hash get their prefix added
/// when missing and are dropped when they carry nothing beyond the prefix.
#[must_use]
pub fn create_path(pathname: &str, search: &str, hash: &str) -> String {
    let mut path = if pathname.is_empty() {
        "/".to_string()
    } else {
        pathname.to_string()
    };

    if !search.is_empty() && search != "?" {
        if !search.starts_with('?') {
            path.push('?');
        }
        path.push_str(search);
    }

    if !hash.is_empty() && hash != "#" {
        if !hash.starts_with('#') {
            path.push('#');
        }
        path.push_str(hash);
    }

    path
}

/// Splits a path string into `(pathname, search, hash)`.
///
/// The pathname is returned unresolved, possibly empty (e.g. for `"?q"`),
/// so that the caller can inherit it from the current location.
#[must_use]
pub fn parse_path(path: &str) -> (String, String, String) {
    let mut pathname = if path.is_empty() { "/" } else { path };
    let mut search = "";
    let mut hash = "";

    if let Some(index) = pathname.find('#') {
        hash = &pathname[index..];
        pathname = &pathname[..index];
    }

    if let Some(index) = pathname.find('?') {
        search = &pathname[index..];
        pathname = &pathname[..index];
    }

    (
        pathname.to_string(),
        if search == "?" { "" } else { search }.to_string(),
        if hash == "#" { "" } else { hash }.to_string(),
    )
}

/// Resolves `to` against the directory of `from`, folding `.` and `..`.
///
/// ```rust
/// use apphistory_source::resolve_pathname;
///
/// assert_eq!(resolve_pathname("c", "/a/b"), "/a/c");
/// assert_eq!(resolve_pathname("../c", "/a/b/"), "/a/c");
/// assert_eq!(resolve_pathname("/x/./y", "/a"), "/x/y");
/// ```
#[must_use]
pub fn resolve_pathname(to: &str, from: &str) -> String {
    if to.starts_with('/') {
        return normalize(to);
    }

    let base = match from.rfind('/') {
        Some(index) => &from[..=index],
        None => "/",
    };

    normalize(&format!("{base}{to}"))
}

fn normalize(path: &str) -> String {
    let trailing = matches!(path.rsplit('/').next(), Some("" | "." | ".."));
    let mut stack: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    let mut resolved = format!("/{}", stack.join("/"));
    if trailing && !resolved.ends_with('/') {
        resolved.push('/');
    }
    resolved
}

fn prefixed(part: &str, prefix: char) -> String {
    if part.is_empty() || part.starts_with(prefix) {
        part.to_string()
    } else {
        format!("{prefix}{part}")
    }
}
