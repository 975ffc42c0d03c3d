//! Reference-counted suppression gate.
//!
//! While at least one [`Suppression`] is held, side effects driven by raw
//! source events are skipped: listeners are not notified, the tracked view is
//! frozen, and block hooks let everything through. Internal bookkeeping
//! navigation (scanning, cutting, tombstone correction) runs inside a
//! suppression so that callers only see its final outcome.
//!
//! When the last suppression is released, the registered resume hooks run so
//! that components which ignored events can resynchronize.

use apphistory_source::{Listeners, Registration};
use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use tracing::trace;

type ResumeHook = dyn Fn();

#[derive(Default)]
struct SuppressorState {
    count: Cell<usize>,
    on_resume: Listeners<ResumeHook>,
}

/// Shared suppression counter. Clones refer to the same counter.
#[derive(Clone, Default)]
pub struct Suppressor {
    state: Rc<SuppressorState>,
}

impl Suppressor {
    /// Creates an inactive suppressor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while any suppression is held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.count.get() > 0
    }

    /// Number of suppressions currently held.
    #[must_use]
    pub fn count(&self) -> usize {
        self.state.count.get()
    }

    /// Acquires a suppression.
    pub fn suppress(&self) -> Suppression {
        let count = self.state.count.get() + 1;
        self.state.count.set(count);
        trace!("suppression acquired ({} held)", count);
        Suppression {
            state: Some(Rc::clone(&self.state)),
        }
    }

    /// Runs `action` suppressed, releasing when it settles either way.
    pub async fn suppress_while<F>(&self, action: F) -> F::Output
    where
        F: Future,
    {
        let _suppression = self.suppress();
        action.await
    }

    /// Registers a hook that runs each time the count drops back to zero.
    pub fn on_resume(&self, hook: Rc<ResumeHook>) -> Registration {
        self.state.on_resume.register(hook)
    }
}

impl fmt::Debug for Suppressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suppressor")
            .field("count", &self.count())
            .finish()
    }
}

/// A held suppression.
///
/// Released by [`release`](Self::release) or on drop, whichever comes first.
/// Releasing twice has no further effect.
#[must_use = "suppression ends as soon as this guard is dropped"]
pub struct Suppression {
    state: Option<Rc<SuppressorState>>,
}

impl Suppression {
    /// Releases the suppression.
    pub fn release(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };

        let count = state.count.get().saturating_sub(1);
        state.count.set(count);
        trace!("suppression released ({} held)", count);

        if count == 0 {
            state.on_resume.dispatch(|hook| hook());
        }
    }

    /// Returns true until released.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.state.is_some()
    }
}

impl Drop for Suppression {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Suppression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suppression")
            .field("held", &self.is_held())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_nested_suppressions() {
        let suppressor = Suppressor::new();
        assert!(!suppressor.is_active());

        let mut outer = suppressor.suppress();
        let mut inner = suppressor.suppress();
        assert_eq!(suppressor.count(), 2);

        inner.release();
        assert!(suppressor.is_active());

        outer.release();
        assert!(!suppressor.is_active());
    }

    #[test]
    fn test_release_is_idempotent() {
        let suppressor = Suppressor::new();
        let _other = suppressor.suppress();
        let mut suppression = suppressor.suppress();

        suppression.release();
        suppression.release();
        drop(suppression);

        assert_eq!(suppressor.count(), 1);
    }

    #[test]
    fn test_resume_hook_runs_when_fully_released() {
        let suppressor = Suppressor::new();
        let resumed = Rc::new(Cell::new(0));

        let _hook = {
            let resumed = Rc::clone(&resumed);
            suppressor.on_resume(Rc::new(move || resumed.set(resumed.get() + 1)))
        };

        let outer = suppressor.suppress();
        drop(suppressor.suppress());
        assert_eq!(resumed.get(), 0);

        drop(outer);
        assert_eq!(resumed.get(), 1);
    }

    #[tokio::test]
    async fn test_suppress_while_releases_on_error() {
        let suppressor = Suppressor::new();

        let outcome: Result<(), &str> = suppressor
            .suppress_while(async {
                assert!(suppressor.is_active());
                Err("boom")
            })
            .await;

        assert_eq!(outcome, Err("boom"));
        assert!(!suppressor.is_active());
    }
}
