//! # Meta State Codec
//!
//! Every entry the app history creates carries a wrapped state:
//!
//! ```text
//! {
//!   "data": <caller state>,
//!   "meta": { "depth": 3, "cache": ["/", "/a", "/b"], "cut": "before" }
//! }
//! ```
//!
//! `data` is what callers see; `meta` is the bookkeeping that lets depth and
//! the backlog survive arbitrary back/forward motion. This layout is the only
//! persisted format and lives in the raw source's entries, so decoding is a
//! trust boundary: anything with access to the raw history can write there.
//!
//! ## Validation
//!
//! | Field | Rule |
//! |-------|------|
//! | `depth` | integer in `0..=MAX_DEPTH` (no fractions, no overflow) |
//! | `cache` | array of strings, `cache.len() <= depth` |
//! | `cut` | `"before"` or `"here"`; anything else reads as absent |
//!
//! An entry whose state fails validation is *foreign*: it is treated as an
//! unwrapped depth-zero location, never as an error. Unknown fields are
//! ignored so that entries written by other versions still decode.
//!
//! ## Transitions
//!
//! | Action | depth | cache | cut |
//! |--------|-------|-------|-----|
//! | PUSH | `+1` | append current href | `before` if current is `here` |
//! | POP | `-1` (floor 0) | drop last | cleared |
//! | REPLACE | same | same | same |
//!
//! After each transition the oldest cache entries are evicted down to the
//! cache limit.

use apphistory_source::{Action, HistorySource, Location, LocationDescriptor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Largest depth an entry may carry. Deeper entries are foreign, which keeps
/// every depth representable as a relative `go` offset.
pub const MAX_DEPTH: usize = isize::MAX as usize;

/// Which side of a truncation boundary an entry sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutMarker {
    /// The entry directly after a tombstone.
    Before,
    /// A tombstone: never a real destination.
    Here,
}

impl CutMarker {
    /// Wire name of the marker.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::Here => "here",
        }
    }
}

/// Bookkeeping attached to each entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaState {
    /// Forward pushes since the home entry.
    pub depth: usize,
    /// Hrefs reachable by stepping back, oldest first.
    pub cache: Vec<String>,
    /// Truncation marker, if this entry was produced by a cut.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_cut"
    )]
    pub cut: Option<CutMarker>,
}

impl MetaState {
    /// The home entry's meta: depth zero, empty cache.
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            depth: 0,
            cache: Vec::new(),
            cut: None,
        }
    }

    /// Returns true for a tombstone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.cut == Some(CutMarker::Here)
    }

    /// Returns true for the entry directly after a tombstone.
    #[must_use]
    pub fn is_after_cut(&self) -> bool {
        self.cut == Some(CutMarker::Before)
    }

    /// Returns a copy with `cut` set.
    #[must_use]
    pub fn with_cut(mut self, cut: Option<CutMarker>) -> Self {
        self.cut = cut;
        self
    }

    /// Computes the meta of the entry that `action` produces from this one.
    ///
    /// `href` is the rendered href of the entry this meta belongs to.
    /// `cache_limit == None` keeps the whole backlog.
    #[must_use]
    pub fn advance(&self, action: Action, href: &str, cache_limit: Option<usize>) -> Self {
        let mut next = match action {
            Action::Push => {
                let mut cache = self.cache.clone();
                cache.push(href.to_string());
                Self {
                    depth: self.depth.saturating_add(1).min(MAX_DEPTH),
                    cache,
                    cut: self.is_tombstone().then_some(CutMarker::Before),
                }
            }
            Action::Pop => {
                let mut cache = self.cache.clone();
                cache.pop();
                Self {
                    depth: self.depth.saturating_sub(1),
                    cache,
                    cut: None,
                }
            }
            Action::Replace => self.clone(),
        };

        if let Some(limit) = cache_limit {
            if next.cache.len() > limit {
                let excess = next.cache.len() - limit;
                next.cache.drain(..excess);
            }
        }

        next
    }

    /// Encodes the meta in its persisted shape.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("depth".to_string(), Value::from(self.depth));
        map.insert("cache".to_string(), Value::from(self.cache.clone()));
        if let Some(cut) = self.cut {
            map.insert("cut".to_string(), Value::from(cut.as_str()));
        }
        Value::Object(map)
    }
}

impl Default for MetaState {
    fn default() -> Self {
        Self::initial()
    }
}

fn lenient_cut<'de, D>(deserializer: D) -> Result<Option<CutMarker>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| CutMarker::deserialize(value).ok()))
}

/// Validates and decodes a meta object.
#[must_use]
pub fn decode_meta(value: &Value) -> Option<MetaState> {
    if !value.is_object() {
        return None;
    }

    MetaState::deserialize(value)
        .ok()
        .filter(|meta| meta.depth <= MAX_DEPTH && meta.depth >= meta.cache.len())
}

/// Returns true if `value` is a valid meta object.
#[must_use]
pub fn is_meta_state(value: &Value) -> bool {
    decode_meta(value).is_some()
}

/// Decodes the meta carried by a wrapped entry state.
#[must_use]
pub fn meta_of_state(state: &Value) -> Option<MetaState> {
    state.get("meta").and_then(decode_meta)
}

/// Decodes the meta carried by a location, if it is wrapped.
#[must_use]
pub fn meta_of(location: &Location) -> Option<MetaState> {
    meta_of_state(&location.state)
}

/// Returns true if the location's state decodes as a wrapped state.
#[must_use]
pub fn is_wrapped_location(location: &Location) -> bool {
    meta_of(location).is_some()
}

/// Returns true if the location is a tombstone left by a dirty cut.
#[must_use]
pub fn is_tombstone(location: &Location) -> bool {
    meta_of(location).is_some_and(|meta| meta.is_tombstone())
}

/// Wraps caller data together with its meta.
#[must_use]
pub fn wrap_state(data: Value, meta: &MetaState) -> Value {
    let mut map = Map::new();
    map.insert("data".to_string(), data);
    map.insert("meta".to_string(), meta.to_value());
    Value::Object(map)
}

/// Extracts the caller data from a wrapped state, or returns the state itself
/// when it is not wrapped.
#[must_use]
pub fn unwrap_state(state: Value) -> Value {
    if meta_of_state(&state).is_none() {
        return state;
    }

    match state {
        Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
        other => other,
    }
}

/// Returns a descriptor for `location` wrapped with initial meta.
#[must_use]
pub fn wrap_location(location: &Location) -> LocationDescriptor {
    let state = wrap_state(location.state.clone(), &MetaState::initial());
    LocationDescriptor::from(location.clone().with_state(state))
}

/// Returns the caller-visible version of a location.
#[must_use]
pub fn unwrap_location(location: Location) -> Location {
    let state = unwrap_state(location.state.clone());
    location.with_state(state)
}

/// Computes the meta of the next entry from the source's current entry.
///
/// A foreign current entry counts as a fresh home entry.
#[must_use]
pub fn next_meta_state(
    source: &dyn HistorySource,
    action: Action,
    cache_limit: Option<usize>,
) -> MetaState {
    let location = source.location();
    let href = source.create_href(&location);
    meta_of(&location)
        .unwrap_or_default()
        .advance(action, &href, cache_limit)
}

/// Wraps `data` with the meta of the entry `action` will produce.
#[must_use]
pub fn next_state(
    source: &dyn HistorySource,
    action: Action,
    data: Value,
    cache_limit: Option<usize>,
) -> Value {
    wrap_state(data, &next_meta_state(source, action, cache_limit))
}

/// Wraps a descriptor's state with the meta of the entry `action` will
/// produce.
#[must_use]
pub fn next_descriptor(
    source: &dyn HistorySource,
    action: Action,
    to: LocationDescriptor,
    cache_limit: Option<usize>,
) -> LocationDescriptor {
    let data = to.state.clone();
    to.with_state(next_state(source, action, data, cache_limit))
}
