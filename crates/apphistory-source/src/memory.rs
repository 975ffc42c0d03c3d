//! In-memory history source.
//!
//! [`MemoryHistory`] keeps its entries in a vector and behaves like a browser
//! tab's session history minus the browser: pushes truncate the forward
//! branch, `go` clamps into range, and every navigation passes the transition
//! check before it is applied.
//!
//! ## Notification Rules
//!
//! | Call | Allowed | Denied |
//! |------|---------|--------|
//! | `push` | notify `(new, PUSH)` | nothing |
//! | `replace` | notify `(new, REPLACE)` | nothing |
//! | `go` | notify `(target, POP)` | notify `(current, current action)` |
//!
//! `go` always notifies, even when clamped to the current entry or denied,
//! so a caller awaiting it always hears back.

use crate::listeners::{weak_registration, Listeners, Registration};
use crate::location::{Action, Location, LocationDescriptor};
use crate::source::{HistorySource, RawListener};
use crate::transition::{allow_all, ConfirmCallback, Transition, TransitionHook, UserConfirmation};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;
use uuid::Uuid;

/// Initial contents of a [`MemoryHistory`].
///
/// # Example
///
/// ```rust
/// use apphistory_source::MemoryOptions;
///
/// let options = MemoryOptions::new()
///     .with_initial_entries(["/", "/inbox"])
///     .with_initial_index(0);
/// assert_eq!(options.initial_entries.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryOptions {
    /// Paths of the initial entries, oldest first.
    pub initial_entries: Vec<String>,
    /// Index of the initial current entry. Defaults to the last entry.
    pub initial_index: Option<usize>,
}

impl MemoryOptions {
    /// A single entry at `/`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initial_entries: vec!["/".to_string()],
            initial_index: None,
        }
    }

    /// Sets the initial entries.
    #[must_use]
    pub fn with_initial_entries<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial_entries = entries.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the initial current entry.
    #[must_use]
    pub const fn with_initial_index(mut self, index: usize) -> Self {
        self.initial_index = Some(index);
        self
    }
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self::new()
    }
}

struct Entries {
    stack: Vec<Location>,
    index: usize,
    action: Action,
}

/// A history source backed by a vector of entries.
///
/// Always handled through an `Rc`: a confirmation that answers later needs a
/// way back to the history to apply the navigation.
///
/// # Example
///
/// ```rust
/// use apphistory_source::{HistorySource, MemoryHistory, MemoryOptions};
///
/// let history = MemoryHistory::new(MemoryOptions::new());
/// history.push("foo".into());
/// history.push("bar".into());
/// history.go_back();
///
/// assert_eq!(history.location().pathname, "/foo");
/// assert_eq!(history.len(), 3);
/// ```
pub struct MemoryHistory {
    this: Weak<MemoryHistory>,
    entries: RefCell<Entries>,
    listeners: Listeners<dyn Fn(&Location, Action)>,
    hook: RefCell<Option<(u64, TransitionHook)>>,
    hook_generation: Cell<u64>,
    confirmation: UserConfirmation,
}

impl MemoryHistory {
    /// Creates a history whose confirmations always allow.
    #[must_use]
    pub fn new(options: MemoryOptions) -> Rc<Self> {
        Self::with_confirmation(options, allow_all())
    }

    /// Creates a history that asks `confirmation` whenever a hook returns
    /// [`Transition::Confirm`].
    #[must_use]
    pub fn with_confirmation(options: MemoryOptions, confirmation: UserConfirmation) -> Rc<Self> {
        let mut stack: Vec<Location> = options
            .initial_entries
            .iter()
            .map(|path| LocationDescriptor::path(path).resolve(Some(create_key()), None))
            .collect();

        if stack.is_empty() {
            stack.push(LocationDescriptor::path("/").resolve(Some(create_key()), None));
        }

        let last = stack.len() - 1;
        let index = options.initial_index.map_or(last, |index| index.min(last));

        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            entries: RefCell::new(Entries {
                stack,
                index,
                action: Action::Pop,
            }),
            listeners: Listeners::new(),
            hook: RefCell::new(None),
            hook_generation: Cell::new(0),
            confirmation,
        })
    }

    /// Index of the current entry.
    #[must_use]
    pub fn index(&self) -> usize {
        self.entries.borrow().index
    }

    /// A copy of every entry, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<Location> {
        self.entries.borrow().stack.clone()
    }

    /// Returns true while a transition hook is installed.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.hook.borrow().is_some()
    }

    fn notify(&self, location: &Location, action: Action) {
        self.listeners.dispatch(|listener| listener(location, action));
    }

    fn confirm_transition(
        &self,
        target: &Location,
        action: Action,
        apply: impl FnOnce(&Self, bool) + 'static,
    ) {
        let hook = self.hook.borrow().as_ref().map(|(_, hook)| Rc::clone(hook));
        let decision = hook.map_or(Transition::Allow, |hook| hook(target, action));

        match decision {
            Transition::Allow => apply(self, true),
            Transition::Deny => {
                trace!("{} to {} denied by hook", action, target.href());
                apply(self, false);
            }
            Transition::Confirm(message) => {
                let this = self.this.clone();
                let callback = ConfirmCallback::new(move |allowed| {
                    if let Some(history) = this.upgrade() {
                        apply(&*history, allowed);
                    }
                });
                (self.confirmation)(&message, callback);
            }
        }
    }

    fn commit(&self, location: Location, action: Action) {
        {
            let mut entries = self.entries.borrow_mut();
            match action {
                Action::Push => {
                    let next = entries.index + 1;
                    entries.stack.truncate(next);
                    entries.stack.push(location.clone());
                    entries.index = next;
                }
                Action::Replace => {
                    let index = entries.index;
                    entries.stack[index] = location.clone();
                }
                Action::Pop => {}
            }
            entries.action = action;
        }
        self.notify(&location, action);
    }
}

impl HistorySource for MemoryHistory {
    fn location(&self) -> Location {
        let entries = self.entries.borrow();
        entries.stack[entries.index].clone()
    }

    fn action(&self) -> Action {
        self.entries.borrow().action
    }

    fn len(&self) -> usize {
        self.entries.borrow().stack.len()
    }

    fn push(&self, to: LocationDescriptor) {
        let target = to.resolve(Some(create_key()), Some(&self.location()));
        self.confirm_transition(&target.clone(), Action::Push, move |history, allowed| {
            if allowed {
                history.commit(target, Action::Push);
            }
        });
    }

    fn replace(&self, to: LocationDescriptor) {
        let target = to.resolve(Some(create_key()), Some(&self.location()));
        self.confirm_transition(&target.clone(), Action::Replace, move |history, allowed| {
            if allowed {
                history.commit(target, Action::Replace);
            }
        });
    }

    fn go(&self, delta: isize) {
        let (next, target) = {
            let entries = self.entries.borrow();
            let last = entries.stack.len() as isize - 1;
            let next = (entries.index as isize).saturating_add(delta).clamp(0, last) as usize;
            (next, entries.stack[next].clone())
        };

        self.confirm_transition(&target.clone(), Action::Pop, move |history, allowed| {
            if allowed {
                {
                    let mut entries = history.entries.borrow_mut();
                    entries.index = next.min(entries.stack.len() - 1);
                }
                let current = history.location();
                history.commit(current, Action::Pop);
            } else {
                let (current, action) = (history.location(), history.action());
                history.notify(&current, action);
            }
        });
    }

    fn listen(&self, listener: RawListener) -> Registration {
        self.listeners.register(listener)
    }

    fn block(&self, hook: TransitionHook) -> Registration {
        let generation = self.hook_generation.get() + 1;
        self.hook_generation.set(generation);
        self.hook.replace(Some((generation, hook)));

        match self.this.upgrade() {
            Some(this) => weak_registration(&this, move |history: &MemoryHistory| {
                let mut hook = history.hook.borrow_mut();
                if matches!(hook.as_ref(), Some((current, _)) if *current == generation) {
                    *hook = None;
                }
            }),
            None => Registration::noop(),
        }
    }
}

impl fmt::Debug for MemoryHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.borrow();
        f.debug_struct("MemoryHistory")
            .field("len", &entries.stack.len())
            .field("index", &entries.index)
            .field("action", &entries.action)
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

fn create_key() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(history: &MemoryHistory) -> (Rc<Cell<usize>>, Registration) {
        let count = Rc::new(Cell::new(0));
        let registration = {
            let count = Rc::clone(&count);
            history.listen(Rc::new(move |_: &Location, _: Action| {
                count.set(count.get() + 1);
            }))
        };
        (count, registration)
    }

    #[test]
    fn test_initial_state() {
        let history = MemoryHistory::new(MemoryOptions::new());
        assert_eq!(history.len(), 1);
        assert_eq!(history.location().pathname, "/");
        assert_eq!(history.action(), Action::Pop);
        assert!(history.location().key.is_some());
    }

    #[test]
    fn test_initial_index_is_clamped() {
        let options = MemoryOptions::new()
            .with_initial_entries(["/a", "/b"])
            .with_initial_index(9);
        let history = MemoryHistory::new(options);
        assert_eq!(history.index(), 1);
        assert_eq!(history.location().pathname, "/b");
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let history = MemoryHistory::new(MemoryOptions::new());
        history.push("a".into());
        history.push("b".into());
        history.go_back();
        history.push("c".into());

        let paths: Vec<String> = history.entries().into_iter().map(|l| l.pathname).collect();
        assert_eq!(paths, vec!["/", "/a", "/c"]);
        assert_eq!(history.action(), Action::Push);
    }

    #[test]
    fn test_replace_overwrites_current() {
        let history = MemoryHistory::new(MemoryOptions::new());
        history.push("a".into());
        history.replace("b".into());
        assert_eq!(history.len(), 2);
        assert_eq!(history.location().pathname, "/b");
        assert_eq!(history.action(), Action::Replace);
    }

    #[test]
    fn test_go_clamps_and_always_notifies() {
        let history = MemoryHistory::new(MemoryOptions::new());
        let (count, _registration) = counter(&history);

        history.go(-5);
        assert_eq!(count.get(), 1);
        assert_eq!(history.index(), 0);

        history.go(0);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_denied_push_is_silent() {
        let history = MemoryHistory::new(MemoryOptions::new());
        let (count, _registration) = counter(&history);
        let _block = history.block(Rc::new(|_: &Location, _: Action| Transition::Deny));

        history.push("a".into());
        assert_eq!(count.get(), 0);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_denied_go_notifies_unchanged_location() {
        let history = MemoryHistory::new(MemoryOptions::new());
        history.push("a".into());
        let (count, _registration) = counter(&history);
        let _block = history.block(Rc::new(|_: &Location, _: Action| Transition::Deny));

        history.go_back();
        assert_eq!(count.get(), 1);
        assert_eq!(history.location().pathname, "/a");
    }

    #[test]
    fn test_deferred_confirmation() {
        let pending: Rc<RefCell<Option<ConfirmCallback>>> = Rc::new(RefCell::new(None));
        let confirmation: UserConfirmation = {
            let pending = Rc::clone(&pending);
            Rc::new(move |message: &str, callback: ConfirmCallback| {
                assert_eq!(message, "sure?");
                pending.replace(Some(callback));
            })
        };

        let history = MemoryHistory::with_confirmation(MemoryOptions::new(), confirmation);
        let _block = history.block(Rc::new(|_: &Location, _: Action| {
            Transition::Confirm("sure?".into())
        }));

        history.push("a".into());
        assert_eq!(history.len(), 1);

        let callback = pending.borrow_mut().take().unwrap();
        callback.resolve(true);
        assert_eq!(history.location().pathname, "/a");
    }

    #[test]
    fn test_stale_unblock_keeps_newer_hook() {
        let history = MemoryHistory::new(MemoryOptions::new());
        let mut first = history.block(Rc::new(|_: &Location, _: Action| Transition::Deny));
        let _second = history.block(Rc::new(|_: &Location, _: Action| Transition::Deny));

        first.unregister();
        assert!(history.is_blocked());
    }

    #[test]
    fn test_listener_may_navigate_reentrantly() {
        let history = MemoryHistory::new(MemoryOptions::new());
        history.push("a".into());

        let bounced = Rc::new(Cell::new(false));
        let _registration = {
            let weak = Rc::downgrade(&history);
            let bounced = Rc::clone(&bounced);
            history.listen(Rc::new(move |location: &Location, _: Action| {
                if location.pathname == "/b" && !bounced.get() {
                    bounced.set(true);
                    if let Some(history) = weak.upgrade() {
                        history.go_back();
                    }
                }
            }))
        };

        history.push("b".into());
        assert!(bounced.get());
        assert_eq!(history.location().pathname, "/a");
    }
}
