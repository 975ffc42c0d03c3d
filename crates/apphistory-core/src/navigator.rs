//! Travel through existing entries.
//!
//! `go_back_to` is where scanning meets navigation:
//!
//! ```text
//!  scan(matcher)
//!     │
//!     ├─ found ─────────────────► go(delta) ─► [replace state]      → true
//!     │
//!     └─ not found
//!          ├─ predicate/pattern ─► go(undo)                         → false
//!          └─ href/location ─────► go(home) ─► replace(target)      → true
//! ```
//!
//! The final `go` is notified only when nothing follows it; when a replace
//! follows, the `go` is suppressed and listeners see the replace alone.

use crate::error::Result;
use crate::meta::{meta_of, unwrap_location};
use crate::mutator::Mutator;
use crate::scanner::{Matcher, Scanner};
use crate::suppressor::Suppressor;
use apphistory_source::{HistorySource, LocationDescriptor};
use serde_json::Value;
use std::rc::Rc;
use tracing::debug;

/// Back, forward, home and matcher-driven travel.
pub struct Navigator {
    source: Rc<dyn HistorySource>,
    suppressor: Suppressor,
    mutator: Rc<Mutator>,
    scanner: Rc<Scanner>,
}

impl Navigator {
    /// Creates a navigator.
    #[must_use]
    pub fn new(
        source: Rc<dyn HistorySource>,
        suppressor: Suppressor,
        mutator: Rc<Mutator>,
        scanner: Rc<Scanner>,
    ) -> Self {
        Self {
            source,
            suppressor,
            mutator,
            scanner,
        }
    }

    /// Moves `delta` entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or is blocked.
    pub async fn go(&self, delta: isize) -> Result<()> {
        self.mutator.go(delta).await
    }

    /// Moves one entry forward.
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or is blocked.
    pub async fn go_forward(&self) -> Result<()> {
        self.mutator.update(|| self.source.go_forward()).await
    }

    /// Goes back to the most recent entry matching `matcher` (one entry when
    /// `None`), optionally replacing its state.
    ///
    /// A matcher naming a destination that cannot be found sends the history
    /// home and replaces the home entry with that destination. A
    /// [`Matcher::Location`] with non-null state supplies the state itself.
    ///
    /// Returns `false` only when a predicate or pattern matched nothing; the
    /// history is then back where it started.
    ///
    /// # Errors
    ///
    /// Returns an error if a round trip fails or is blocked.
    pub async fn go_back_to(&self, matcher: Option<Matcher>, state: Option<Value>) -> Result<bool> {
        let conditional = matcher.as_ref().is_some_and(Matcher::is_conditional);

        let state = match &matcher {
            Some(Matcher::Location(target)) if !target.state.is_null() => Some(target.state.clone()),
            _ => state,
        };

        let mut found = self.scanner.scan(matcher.as_ref()).await?;
        let mut will_replace = state.is_some();
        let mut destination: Option<LocationDescriptor> = None;

        let delta = match found.delta {
            Some(delta) => delta,
            None if conditional => {
                debug!("go_back_to {:?}: no match, returning", matcher);
                if found.undo != 0 {
                    self.go(found.undo).await?;
                }
                found.release();
                return Ok(false);
            }
            None => {
                will_replace = true;
                destination = matcher.as_ref().and_then(Matcher::destination);
                debug!("go_back_to {:?}: no match, going home", matcher);
                self.distance_to_home()
            }
        };

        match (found.resume.is_some(), will_replace) {
            (true, false) => found.release(),
            (false, true) => found.resume = Some(self.suppressor.suppress()),
            _ => {}
        }

        self.go(delta).await?;

        if will_replace {
            found.release();

            let state = state.unwrap_or(Value::Null);
            let target = match destination {
                Some(destination) => destination.with_state(state),
                None => LocationDescriptor::from(unwrap_location(self.source.location()).without_key())
                    .with_state(state),
            };

            self.mutator.replace(target).await?;
        }

        Ok(true)
    }

    /// Goes to the home entry, then replaces it with `target` if given.
    ///
    /// With a target, the travel home is suppressed and listeners see only
    /// the replace.
    ///
    /// # Errors
    ///
    /// Returns an error if a round trip fails or is blocked.
    pub async fn go_home(&self, target: Option<LocationDescriptor>) -> Result<()> {
        let delta = self.distance_to_home();

        if delta != 0 {
            let _suppression = target.is_some().then(|| self.suppressor.suppress());
            self.go(delta).await?;
        }

        if let Some(target) = target {
            self.mutator.replace(target).await?;
        }

        Ok(())
    }

    /// Offset from the current raw entry to home (zero or negative).
    #[must_use]
    pub fn distance_to_home(&self) -> isize {
        let depth = meta_of(&self.source.location()).map_or(0, |meta| meta.depth);
        -isize::try_from(depth).unwrap_or(isize::MAX)
    }
}
