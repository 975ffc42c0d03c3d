//! Single-flight raw navigation.
//!
//! Every push, replace and go the app history issues goes through
//! [`Mutator::update`], which allows exactly one raw navigation to await its
//! outcome at a time:
//!
//! ```text
//!  update(action)
//!     │
//!     ├─ pending already set ──────────────► Err(ConcurrentNavigation)
//!     │
//!     ├─ listen to the source (one shot)
//!     ├─ action()                      ┌──── change_was_blocked()
//!     │                                ▼
//!     └─ await ◄── next location event ──► Ok(())   (tombstones skipped)
//!                                      └──► Err(NavigationBlocked)
//! ```
//!
//! A tombstone event seen while nothing is suppressed is not final: the
//! tracker is about to bounce off it, and the bounce is what settles the
//! round trip.

use crate::error::{HistoryError, Result};
use crate::meta::{is_tombstone, next_descriptor};
use crate::suppressor::Suppressor;
use apphistory_source::{Action, HistorySource, Location, LocationDescriptor, Registration};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Settle = oneshot::Sender<Result<()>>;

/// The resolver of the raw navigation currently in flight, if any.
///
/// Shared between the mutator and everything that learns about the outcome
/// of a navigation from another direction (block hooks and confirmations).
#[derive(Clone, Default)]
pub struct PendingNavigation {
    slot: Rc<RefCell<Option<(u64, Settle)>>>,
    next_id: Rc<Cell<u64>>,
}

impl PendingNavigation {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a navigation awaits its outcome.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Rejects the pending navigation with [`HistoryError::NavigationBlocked`].
    ///
    /// Does nothing when no navigation is pending.
    pub fn change_was_blocked(&self) {
        if self.settle(Err(HistoryError::NavigationBlocked)) {
            debug!("pending navigation was blocked");
        }
    }

    fn begin(&self) -> Result<(u64, oneshot::Receiver<Result<()>>)> {
        let mut slot = self.slot.borrow_mut();
        if slot.is_some() {
            return Err(HistoryError::ConcurrentNavigation);
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let (sender, receiver) = oneshot::channel();
        *slot = Some((id, sender));
        Ok((id, receiver))
    }

    fn settle(&self, outcome: Result<()>) -> bool {
        let pending = self.slot.borrow_mut().take();
        match pending {
            Some((_, sender)) => {
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }

    fn finish(&self, id: u64) {
        let mut slot = self.slot.borrow_mut();
        if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            *slot = None;
        }
    }
}

impl fmt::Debug for PendingNavigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingNavigation")
            .field("pending", &self.is_pending())
            .finish()
    }
}

struct InFlight {
    pending: PendingNavigation,
    id: u64,
    registration: Registration,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.registration.unregister();
        self.pending.finish(self.id);
    }
}

/// Issues raw navigations one at a time and awaits their outcome.
pub struct Mutator {
    source: Rc<dyn HistorySource>,
    suppressor: Suppressor,
    pending: PendingNavigation,
    cache_limit: Option<usize>,
}

impl Mutator {
    /// Creates a mutator settling through `pending`.
    #[must_use]
    pub fn new(
        source: Rc<dyn HistorySource>,
        suppressor: Suppressor,
        pending: PendingNavigation,
        cache_limit: Option<usize>,
    ) -> Self {
        Self {
            source,
            suppressor,
            pending,
            cache_limit,
        }
    }

    /// The shared resolver slot.
    #[must_use]
    pub fn pending(&self) -> &PendingNavigation {
        &self.pending
    }

    /// Runs a raw navigation and waits until the source reports where it
    /// landed, or until the navigation is blocked.
    ///
    /// # Errors
    ///
    /// - [`HistoryError::ConcurrentNavigation`] if another update is pending
    /// - [`HistoryError::NavigationBlocked`] if a hook or the user vetoed it
    /// - [`HistoryError::NavigationInterrupted`] if the resolver was dropped
    pub async fn update<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(),
    {
        let (id, receiver) = self.pending.begin().map_err(|error| {
            warn!("rejected raw navigation: {}", error);
            error
        })?;

        let listener = {
            let pending = self.pending.clone();
            let suppressor = self.suppressor.clone();
            Rc::new(move |location: &Location, kind: Action| {
                if !suppressor.is_active() && is_tombstone(location) {
                    debug!("{} landed on tombstone {}, awaiting correction", kind, location.href());
                    return;
                }
                pending.settle(Ok(()));
            })
        };

        let _in_flight = InFlight {
            pending: self.pending.clone(),
            id,
            registration: self.source.listen(listener),
        };

        action();

        receiver
            .await
            .unwrap_or(Err(HistoryError::NavigationInterrupted))
    }

    /// Pushes `to`, wrapping its state with the next meta.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub async fn push(&self, to: LocationDescriptor) -> Result<()> {
        debug!("push {}", to.href());
        self.update(|| {
            let to = next_descriptor(&*self.source, Action::Push, to, self.cache_limit);
            self.source.push(to);
        })
        .await
    }

    /// Replaces the current entry with `to`, wrapping its state with the
    /// current meta.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub async fn replace(&self, to: LocationDescriptor) -> Result<()> {
        debug!("replace with {}", to.href());
        self.update(|| {
            let to = next_descriptor(&*self.source, Action::Replace, to, self.cache_limit);
            self.source.replace(to);
        })
        .await
    }

    /// Moves `delta` entries.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub async fn go(&self, delta: isize) -> Result<()> {
        debug!("go {}", delta);
        self.update(|| self.source.go(delta)).await
    }
}

impl fmt::Debug for Mutator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutator")
            .field("pending", &self.pending.is_pending())
            .field("cache_limit", &self.cache_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::meta_of;
    use apphistory_source::{MemoryHistory, MemoryOptions, Transition};
    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready};

    fn setup() -> (Rc<MemoryHistory>, Mutator) {
        let source = MemoryHistory::new(MemoryOptions::new());
        let raw: Rc<dyn HistorySource> = source.clone();
        let mutator = Mutator::new(raw, Suppressor::new(), PendingNavigation::new(), Some(20));
        (source, mutator)
    }

    #[tokio::test]
    async fn test_push_wraps_state() {
        let (source, mutator) = setup();

        mutator
            .push(LocationDescriptor::path("/a").with_state(json!({"n": 1})))
            .await
            .unwrap();

        let location = source.location();
        let meta = meta_of(&location).unwrap();
        assert_eq!(meta.depth, 1);
        assert_eq!(meta.cache, vec!["/".to_string()]);
        assert_eq!(location.state["data"], json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_resolves_on_first_event() {
        let (source, mutator) = setup();
        mutator.push("/a".into()).await.unwrap();
        mutator.go(-1).await.unwrap();

        assert_eq!(source.location().pathname, "/");
        assert!(!mutator.pending().is_pending());
    }

    #[test]
    fn test_second_update_is_rejected_while_pending() {
        let (_, mutator) = setup();

        // Nothing notifies, so the first update stays pending.
        let mut first = tokio_test::task::spawn(mutator.update(|| {}));
        assert_pending!(first.poll());

        let mut second = tokio_test::task::spawn(mutator.update(|| {}));
        let outcome = assert_ready!(second.poll());
        assert_eq!(outcome, Err(HistoryError::ConcurrentNavigation));

        mutator.pending().settle(Ok(()));
        assert_eq!(assert_ready!(first.poll()), Ok(()));
    }

    #[test]
    fn test_blocked_signal_rejects() {
        let (source, mutator) = setup();
        let _block = source.block(Rc::new(|_: &Location, _: Action| Transition::Deny));

        let mut push = tokio_test::task::spawn(mutator.push("/a".into()));
        assert_pending!(push.poll());

        mutator.pending().change_was_blocked();
        assert_eq!(assert_ready!(push.poll()), Err(HistoryError::NavigationBlocked));
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_dropped_update_frees_the_slot() {
        let (_, mutator) = setup();

        let mut first = tokio_test::task::spawn(mutator.update(|| {}));
        assert_pending!(first.poll());
        drop(first);

        assert!(!mutator.pending().is_pending());
    }
}
