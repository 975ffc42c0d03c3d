//! Backward lookup through the href backlog.
//!
//! Each entry remembers the hrefs behind it, newest last, up to the cache
//! limit. The scanner tests the current href, then the cached ones from
//! newest to oldest. When the backlog runs out before `depth` does, it
//! steps back past the oldest cached entry to bring the next stretch of
//! history into view and continues from there:
//!
//! ```text
//!  depth:  0    1    2    3    4    5
//!          /    /a   /b   /c   /d   /e      cache limit 3
//!                         ▲         └── current: cache [/b, /c, /d]
//!                         └──────────── after go(-4): cache [/, /a]
//! ```
//!
//! Speculative steps are taken suppressed. The scan result carries both the
//! suppression and the distance travelled so that the caller decides how to
//! finish: undo the steps, or travel on from the scanned position.

use crate::error::Result;
use crate::meta::meta_of;
use crate::mutator::Mutator;
use crate::suppressor::{Suppression, Suppressor};
use apphistory_source::{HistorySource, LocationDescriptor};
use regex::Regex;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Identifies a previously visited location.
#[derive(Clone)]
pub enum Matcher {
    /// Exact href equality.
    Href(String),
    /// A caller predicate over hrefs.
    Predicate(Rc<dyn Fn(&str) -> bool>),
    /// A regular expression tested against hrefs.
    Pattern(Regex),
    /// The href of a location; its state is applied when travelling there.
    Location(LocationDescriptor),
}

impl Matcher {
    /// Wraps a predicate over hrefs.
    pub fn predicate(predicate: impl Fn(&str) -> bool + 'static) -> Self {
        Self::Predicate(Rc::new(predicate))
    }

    /// Returns true for matchers that only test hrefs and never name a
    /// destination of their own.
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        matches!(self, Self::Predicate(_) | Self::Pattern(_))
    }

    /// Tests an href.
    #[must_use]
    pub fn matches(&self, href: &str) -> bool {
        match self {
            Self::Href(target) => target == href,
            Self::Predicate(predicate) => predicate(href),
            Self::Pattern(pattern) => pattern.is_match(href),
            Self::Location(target) => target.href() == href,
        }
    }

    /// The destination this matcher names, if it names one.
    #[must_use]
    pub fn destination(&self) -> Option<LocationDescriptor> {
        match self {
            Self::Href(href) => Some(LocationDescriptor::path(href)),
            Self::Location(target) => Some(LocationDescriptor::path(&target.href())),
            Self::Predicate(_) | Self::Pattern(_) => None,
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Href(href) => f.debug_tuple("Href").field(href).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Pattern(pattern) => f.debug_tuple("Pattern").field(&pattern.as_str()).finish(),
            Self::Location(target) => f.debug_tuple("Location").field(&target.href()).finish(),
        }
    }
}

impl From<&str> for Matcher {
    fn from(href: &str) -> Self {
        Self::Href(href.to_string())
    }
}

impl From<String> for Matcher {
    fn from(href: String) -> Self {
        Self::Href(href)
    }
}

impl From<Regex> for Matcher {
    fn from(pattern: Regex) -> Self {
        Self::Pattern(pattern)
    }
}

impl From<LocationDescriptor> for Matcher {
    fn from(target: LocationDescriptor) -> Self {
        Self::Location(target)
    }
}

/// Outcome of a scan.
#[derive(Debug)]
pub struct ScanResult {
    /// Offset from the scanned position to the match; `None` if not found.
    pub delta: Option<isize>,
    /// Held while the scan has moved the source.
    pub resume: Option<Suppression>,
    /// Distance to go forward to get back to where the scan started.
    pub undo: isize,
}

impl ScanResult {
    /// Releases the scan's suppression, if any.
    pub fn release(&mut self) {
        if let Some(mut resume) = self.resume.take() {
            resume.release();
        }
    }
}

/// Locates previously visited entries.
pub struct Scanner {
    source: Rc<dyn HistorySource>,
    suppressor: Suppressor,
    mutator: Rc<Mutator>,
}

impl Scanner {
    /// Creates a scanner.
    #[must_use]
    pub fn new(source: Rc<dyn HistorySource>, suppressor: Suppressor, mutator: Rc<Mutator>) -> Self {
        Self {
            source,
            suppressor,
            mutator,
        }
    }

    /// Searches backward for `matcher`.
    ///
    /// No matcher means "one entry back". The source may be left at an
    /// earlier position; see [`ScanResult::undo`].
    ///
    /// # Errors
    ///
    /// Returns an error if a speculative step fails. The suppression is
    /// released in that case.
    pub async fn scan(&self, matcher: Option<&Matcher>) -> Result<ScanResult> {
        let mut result = ScanResult {
            delta: Some(0),
            resume: None,
            undo: 0,
        };

        let Some(matcher) = matcher else {
            result.delta = Some(-1);
            return Ok(result);
        };

        let mut delta: isize = 0;

        loop {
            let location = self.source.location();
            if matcher.matches(&self.source.create_href(&location)) {
                result.delta = Some(delta);
                return Ok(result);
            }

            let Some(meta) = meta_of(&location) else {
                break;
            };

            for href in meta.cache.iter().rev() {
                delta -= 1;
                if matcher.matches(href) {
                    result.delta = Some(delta);
                    return Ok(result);
                }
            }

            if meta.depth <= meta.cache.len() {
                break;
            }

            if result.resume.is_none() {
                result.resume = Some(self.suppressor.suppress());
            }

            let cached = meta.cache.len() as isize;
            let togo = cached + 1;

            delta += cached;
            result.undo += togo;

            debug!("scan exhausted cache at depth {}, stepping back {}", meta.depth, togo);
            self.mutator.go(-togo).await?;
        }

        result.delta = None;
        Ok(result)
    }

    /// Returns the offset from the current entry to the most recent entry
    /// matching `matcher`, or `None` if no reachable entry matches.
    ///
    /// The source ends where it started.
    ///
    /// # Errors
    ///
    /// Returns an error if a speculative step or the return trip fails.
    pub async fn find_last(&self, matcher: &Matcher) -> Result<Option<isize>> {
        let mut result = self.scan(Some(matcher)).await?;

        if result.undo != 0 {
            self.mutator.go(result.undo).await?;
            result.delta = result.delta.map(|delta| delta - result.undo);
        }

        result.release();
        debug!("find_last {:?} -> {:?}", matcher, result.delta);
        Ok(result.delta)
    }
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner").finish_non_exhaustive()
    }
}
