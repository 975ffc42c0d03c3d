//! Listener registry with token-based unregistration.
//!
//! Listeners are stored in insertion order under a monotonically increasing
//! id. Dispatch walks a snapshot, and each listener is checked for liveness
//! right before it is called, so a listener unregistered by an earlier
//! listener in the same dispatch is skipped.
//!
//! The same callback may be added several times; each addition is a separate
//! registration and is invoked once per dispatch.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Identifies one registration inside a [`Listeners`] registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// An ordered, shared collection of callbacks.
pub struct Listeners<F: ?Sized> {
    slots: Rc<RefCell<Vec<(ListenerId, Rc<F>)>>>,
    next_id: Rc<Cell<u64>>,
}

impl<F: ?Sized> Clone for Listeners<F> {
    fn clone(&self) -> Self {
        Self {
            slots: Rc::clone(&self.slots),
            next_id: Rc::clone(&self.next_id),
        }
    }
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Vec::new())),
            next_id: Rc::new(Cell::new(0)),
        }
    }
}

impl<F: ?Sized + 'static> fmt::Debug for Listeners<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.len())
            .finish()
    }
}

impl<F: ?Sized + 'static> Listeners<F> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener and returns its id.
    pub fn add(&self, listener: Rc<F>) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.slots.borrow_mut().push((id, listener));
        id
    }

    /// Adds a listener and returns a [`Registration`] that removes it.
    pub fn register(&self, listener: Rc<F>) -> Registration {
        let id = self.add(listener);
        let slots = Rc::downgrade(&self.slots);
        Registration::new(move || {
            if let Some(slots) = slots.upgrade() {
                slots.borrow_mut().retain(|(slot, _)| *slot != id);
            }
        })
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut slots = self.slots.borrow_mut();
        let before = slots.len();
        slots.retain(|(slot, _)| *slot != id);
        slots.len() != before
    }

    /// Returns true while `id` is registered.
    #[must_use]
    pub fn contains(&self, id: ListenerId) -> bool {
        self.slots.borrow().iter().any(|(slot, _)| *slot == id)
    }

    /// Number of live registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// Calls `invoke` for every listener that is still registered when its
    /// turn comes.
    ///
    /// No borrow of the registry is held while `invoke` runs, so listeners
    /// may add or remove registrations.
    pub fn dispatch(&self, mut invoke: impl FnMut(&F)) {
        let snapshot: Vec<(ListenerId, Rc<F>)> = self.slots.borrow().clone();

        for (id, listener) in snapshot {
            if self.contains(id) {
                invoke(&listener);
            }
        }
    }
}

/// Handle returned by every `listen`/`block` style call.
///
/// [`unregister`](Self::unregister) is idempotent: the second and later calls
/// do nothing. Dropping a registration does NOT unregister it.
#[must_use = "keep the registration to be able to unregister later"]
pub struct Registration {
    unregister: Option<Box<dyn FnOnce()>>,
}

impl Registration {
    /// Wraps an arbitrary teardown action.
    pub fn new(unregister: impl FnOnce() + 'static) -> Self {
        Self {
            unregister: Some(Box::new(unregister)),
        }
    }

    /// A registration with nothing to tear down.
    pub fn noop() -> Self {
        Self { unregister: None }
    }

    /// Runs the teardown once.
    pub fn unregister(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }

    /// Returns true until [`unregister`](Self::unregister) has run.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.unregister.is_some()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A registration whose teardown only runs while `owner` is alive.
pub(crate) fn weak_registration<T: 'static>(
    owner: &Rc<T>,
    teardown: impl FnOnce(&T) + 'static,
) -> Registration {
    let owner: Weak<T> = Rc::downgrade(owner);
    Registration::new(move || {
        if let Some(owner) = owner.upgrade() {
            teardown(&owner);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    type Callback = dyn Fn(u32);

    #[test]
    fn test_dispatch_in_registration_order() {
        let listeners: Listeners<Callback> = Listeners::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for tag in 0..3 {
            let seen = Rc::clone(&seen);
            let _ = listeners.add(Rc::new(move |value| seen.borrow_mut().push((tag, value))));
        }

        listeners.dispatch(|listener| listener(7));
        assert_eq!(*seen.borrow(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn test_double_unregister_is_noop() {
        let listeners: Listeners<Callback> = Listeners::new();
        let count = Rc::new(Cell::new(0));

        let callback: Rc<Callback> = {
            let count = Rc::clone(&count);
            Rc::new(move |_| count.set(count.get() + 1))
        };

        let mut first = listeners.register(Rc::clone(&callback));
        let mut second = listeners.register(callback);

        listeners.dispatch(|listener| listener(0));
        assert_eq!(count.get(), 2);

        first.unregister();
        first.unregister();
        assert!(!first.is_active());

        listeners.dispatch(|listener| listener(0));
        assert_eq!(count.get(), 3);

        second.unregister();
        listeners.dispatch(|listener| listener(0));
        assert_eq!(count.get(), 3);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_listener_removed_during_dispatch_is_skipped() {
        let listeners: Listeners<Callback> = Listeners::new();
        let count = Rc::new(Cell::new(0));
        let victim = Rc::new(Cell::new(None));

        {
            let listeners = listeners.clone();
            let victim = Rc::clone(&victim);
            let _ = listeners.clone().add(Rc::new(move |_| {
                if let Some(id) = victim.get() {
                    listeners.remove(id);
                }
            }));
        }

        let id = {
            let count = Rc::clone(&count);
            listeners.add(Rc::new(move |_| count.set(count.get() + 1)))
        };
        victim.set(Some(id));

        listeners.dispatch(|listener| listener(0));
        assert_eq!(count.get(), 0);
        assert!(!listeners.contains(id));
    }

    #[test]
    fn test_debug_reports_len() {
        let listeners: Listeners<Callback> = Listeners::new();
        let _id = listeners.add(Rc::new(|_: u32| {}));
        assert_eq!(format!("{listeners:?}"), "Listeners { len: 1 }");
    }
}
