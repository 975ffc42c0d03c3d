//! Location change fan-out.
//!
//! The notifier subscribes to the raw source only while it has listeners: the
//! subscription is created with the first listener and torn down when the
//! last one leaves. Raw events are delivered unwrapped (callers never see the
//! meta bookkeeping), except:
//!
//! - events arriving while suppressed are dropped, not buffered;
//! - tombstone events are dropped, the tracker announces where the
//!   correction landed instead.

use crate::meta::{is_tombstone, unwrap_location};
use crate::suppressor::Suppressor;
use apphistory_source::{Action, HistorySource, ListenerId, Listeners, Location, Registration};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

/// Callback invoked with the caller-visible location after every change.
pub type HistoryListener = Rc<dyn Fn(&Location, Action)>;

/// Fans out unwrapped location changes to registered listeners.
pub struct Notifier {
    this: Weak<Notifier>,
    source: Rc<dyn HistorySource>,
    suppressor: Suppressor,
    listeners: Listeners<dyn Fn(&Location, Action)>,
    subscription: RefCell<Option<Registration>>,
}

impl Notifier {
    /// Creates a notifier with no listeners and no raw subscription.
    #[must_use]
    pub fn new(source: Rc<dyn HistorySource>, suppressor: Suppressor) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            source,
            suppressor,
            listeners: Listeners::new(),
            subscription: RefCell::new(None),
        })
    }

    /// Registers a listener.
    ///
    /// The same callback may be registered several times; it is then invoked
    /// once per registration.
    pub fn listen(&self, listener: HistoryListener) -> Registration {
        let id = self.listeners.add(listener);
        self.ensure_subscribed();

        let this = self.this.clone();
        Registration::new(move || {
            if let Some(notifier) = this.upgrade() {
                notifier.remove(id);
            }
        })
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true while subscribed to the raw source.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.borrow().is_some()
    }

    /// Delivers an already unwrapped location, unless suppressed.
    pub(crate) fn deliver(&self, location: &Location, action: Action) {
        if self.suppressor.is_active() {
            trace!("dropped {} notification for {} (suppressed)", action, location.href());
            return;
        }

        self.listeners.dispatch(|listener| listener(location, action));
    }

    fn on_source_changed(&self, location: &Location, action: Action) {
        if is_tombstone(location) {
            trace!("dropped {} notification for tombstone {}", action, location.href());
            return;
        }

        let exposed = unwrap_location(location.clone());
        self.deliver(&exposed, action);
    }

    fn ensure_subscribed(&self) {
        if self.subscription.borrow().is_some() {
            return;
        }

        let this = self.this.clone();
        let registration = self.source.listen(Rc::new(move |location: &Location, action: Action| {
            if let Some(notifier) = this.upgrade() {
                notifier.on_source_changed(location, action);
            }
        }));

        self.subscription.replace(Some(registration));
    }

    fn remove(&self, id: ListenerId) {
        if !self.listeners.remove(id) || !self.listeners.is_empty() {
            return;
        }

        let subscription = self.subscription.borrow_mut().take();
        if let Some(mut subscription) = subscription {
            subscription.unregister();
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listener_count())
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{wrap_state, CutMarker, MetaState};
    use apphistory_source::{LocationDescriptor, MemoryHistory, MemoryOptions};
    use serde_json::json;
    use std::cell::Cell;

    fn setup() -> (Rc<MemoryHistory>, Suppressor, Rc<Notifier>) {
        let source = MemoryHistory::new(MemoryOptions::new());
        let suppressor = Suppressor::new();
        let raw: Rc<dyn HistorySource> = source.clone();
        let notifier = Notifier::new(raw, suppressor.clone());
        (source, suppressor, notifier)
    }

    fn counting(count: &Rc<Cell<usize>>) -> HistoryListener {
        let count = Rc::clone(count);
        Rc::new(move |_: &Location, _: Action| count.set(count.get() + 1))
    }

    #[test]
    fn test_listener_invoked_until_unregistered() {
        let (source, _, notifier) = setup();
        let count = Rc::new(Cell::new(0));

        let mut registration = notifier.listen(counting(&count));
        source.push("apa".into());
        assert_eq!(count.get(), 1);

        registration.unregister();
        source.push("bapa".into());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_suppressed_events_are_dropped() {
        let (source, suppressor, notifier) = setup();
        let count = Rc::new(Cell::new(0));
        let _registration = notifier.listen(counting(&count));

        let suppression = suppressor.suppress();
        source.push("apa".into());
        drop(suppression);

        assert_eq!(count.get(), 0);
        source.push("bapa".into());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_same_callback_registered_twice() {
        let (source, _, notifier) = setup();
        let count = Rc::new(Cell::new(0));
        let callback = counting(&count);

        let mut first = notifier.listen(Rc::clone(&callback));
        let mut second = notifier.listen(callback);
        source.push("apa".into());
        assert_eq!(count.get(), 2);

        first.unregister();
        first.unregister();
        source.push("bapa".into());
        assert_eq!(count.get(), 3);

        second.unregister();
        source.push("lapa".into());
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_subscription_follows_listener_count() {
        let (_, _, notifier) = setup();
        assert!(!notifier.is_subscribed());

        let mut registration = notifier.listen(Rc::new(|_: &Location, _: Action| {}));
        assert!(notifier.is_subscribed());

        registration.unregister();
        assert!(!notifier.is_subscribed());
    }

    #[test]
    fn test_delivers_unwrapped_location() {
        let (source, _, notifier) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let _registration = {
            let seen = Rc::clone(&seen);
            notifier.listen(Rc::new(move |location: &Location, _: Action| {
                seen.borrow_mut().push(location.state.clone());
            }))
        };

        let state = wrap_state(json!({"draft": 7}), &MetaState::initial());
        source.push(LocationDescriptor::path("/a").with_state(state));

        let tombstone = MetaState::initial().with_cut(Some(CutMarker::Here));
        source.push(LocationDescriptor::path("/b").with_state(wrap_state(json!(null), &tombstone)));

        assert_eq!(*seen.borrow(), vec![json!({"draft": 7})]);
    }
}
