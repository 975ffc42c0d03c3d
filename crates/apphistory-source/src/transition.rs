//! Transition checks: block hooks and user confirmation.
//!
//! Before a source applies any navigation it asks the installed
//! [`TransitionHook`] (if any) what to do:
//!
//! | Hook answer | Effect |
//! |-------------|--------|
//! | [`Transition::Allow`] | navigation proceeds |
//! | [`Transition::Deny`] | navigation is dropped without asking anyone |
//! | [`Transition::Confirm`] | the [`UserConfirmation`] decides, possibly later |
//!
//! A confirmation receives a one-shot [`ConfirmCallback`]. It may answer
//! inside the call or keep the callback and answer from a later task; the
//! navigation stays pending until it does.

use crate::location::{Action, Location};
use std::fmt;
use std::rc::Rc;

/// What a block hook decided for one prospective navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Let the navigation through.
    Allow,
    /// Drop the navigation.
    Deny,
    /// Ask the user, showing this message.
    Confirm(String),
}

impl Transition {
    /// Returns true for [`Transition::Deny`].
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny)
    }
}

/// Hook consulted before every navigation, given the target and the action.
pub type TransitionHook = Rc<dyn Fn(&Location, Action) -> Transition>;

/// Asks the user whether a blocked navigation may proceed.
pub type UserConfirmation = Rc<dyn Fn(&str, ConfirmCallback)>;

/// One-shot answer channel for a [`UserConfirmation`].
#[must_use = "a navigation stays pending until its confirmation is resolved"]
pub struct ConfirmCallback {
    answer: Box<dyn FnOnce(bool)>,
}

impl ConfirmCallback {
    /// Wraps the continuation that applies (or drops) the navigation.
    pub fn new(answer: impl FnOnce(bool) + 'static) -> Self {
        Self {
            answer: Box::new(answer),
        }
    }

    /// Answers the confirmation. `true` lets the navigation proceed.
    pub fn resolve(self, allowed: bool) {
        (self.answer)(allowed);
    }

    /// Returns a callback that runs `before` with the answer, then this one.
    pub fn intercept(self, before: impl FnOnce(bool) + 'static) -> Self {
        Self::new(move |allowed| {
            before(allowed);
            self.resolve(allowed);
        })
    }
}

impl fmt::Debug for ConfirmCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConfirmCallback")
    }
}

/// A confirmation that allows every navigation.
///
/// This is the default for in-memory sources, which have nobody to ask.
#[must_use]
pub fn allow_all() -> UserConfirmation {
    Rc::new(|_message: &str, callback: ConfirmCallback| callback.resolve(true))
}

/// A confirmation that denies every navigation.
#[must_use]
pub fn deny_all() -> UserConfirmation {
    Rc::new(|_message: &str, callback: ConfirmCallback| callback.resolve(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_intercept_runs_before_resolution() {
        let order = Rc::new(RefCell::new(Vec::new()));

        let callback = {
            let order = Rc::clone(&order);
            ConfirmCallback::new(move |allowed| order.borrow_mut().push(("inner", allowed)))
        };

        let callback = {
            let order = Rc::clone(&order);
            callback.intercept(move |allowed| order.borrow_mut().push(("outer", allowed)))
        };

        callback.resolve(false);
        assert_eq!(*order.borrow(), vec![("outer", false), ("inner", false)]);
    }

    #[test]
    fn test_canned_confirmations() {
        let answers = Rc::new(RefCell::new(Vec::new()));

        for confirm in [allow_all(), deny_all()] {
            let answers = Rc::clone(&answers);
            confirm("leave?", ConfirmCallback::new(move |ok| answers.borrow_mut().push(ok)));
        }

        assert_eq!(*answers.borrow(), vec![true, false]);
    }
}
