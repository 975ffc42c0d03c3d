//! Navigation blocking.
//!
//! A [`BlockPrompt`] is installed on the raw source through a wrapper that:
//!
//! - lets every navigation through while suppressed, so internal bookkeeping
//!   navigation can never be vetoed;
//! - hands the caller's hook the unwrapped location;
//! - rejects the pending round trip when the answer is an outright deny.
//!
//! Denials that come from the user answering a confirmation are caught by
//! [`tracked_confirmation`], which wraps the confirmation the raw source is
//! built with.

use crate::meta::unwrap_location;
use crate::mutator::PendingNavigation;
use crate::suppressor::Suppressor;
use apphistory_source::{
    Action, ConfirmCallback, HistorySource, Location, Registration, Transition, TransitionHook,
    UserConfirmation,
};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// What to do when a navigation is about to happen.
#[derive(Clone)]
pub enum BlockPrompt {
    /// `true` allows every navigation, `false` denies every navigation.
    Flag(bool),
    /// Ask the user with this message.
    Message(String),
    /// Decide per navigation.
    Hook(TransitionHook),
}

impl BlockPrompt {
    /// Wraps a per-navigation decision.
    pub fn hook(hook: impl Fn(&Location, Action) -> Transition + 'static) -> Self {
        Self::Hook(Rc::new(hook))
    }

    fn decide(&self, location: &Location, action: Action) -> Transition {
        match self {
            Self::Flag(true) => Transition::Allow,
            Self::Flag(false) => Transition::Deny,
            Self::Message(message) => Transition::Confirm(message.clone()),
            Self::Hook(hook) => hook(location, action),
        }
    }
}

impl fmt::Debug for BlockPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(flag) => f.debug_tuple("Flag").field(flag).finish(),
            Self::Message(message) => f.debug_tuple("Message").field(message).finish(),
            Self::Hook(_) => f.write_str("Hook(..)"),
        }
    }
}

impl From<bool> for BlockPrompt {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

impl From<&str> for BlockPrompt {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<String> for BlockPrompt {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

/// Installs block prompts on the raw source.
pub struct Blocker {
    source: Rc<dyn HistorySource>,
    suppressor: Suppressor,
    pending: PendingNavigation,
}

impl Blocker {
    /// Creates a blocker that rejects through `pending`.
    #[must_use]
    pub fn new(
        source: Rc<dyn HistorySource>,
        suppressor: Suppressor,
        pending: PendingNavigation,
    ) -> Self {
        Self {
            source,
            suppressor,
            pending,
        }
    }

    /// Installs `prompt`, replacing whatever the source had installed.
    pub fn block(&self, prompt: BlockPrompt) -> Registration {
        let suppressor = self.suppressor.clone();
        let pending = self.pending.clone();

        self.source.block(Rc::new(move |location: &Location, action: Action| {
            if suppressor.is_active() {
                return Transition::Allow;
            }

            let decision = prompt.decide(&unwrap_location(location.clone()), action);
            if decision.is_denied() {
                debug!("{} to {} denied by block prompt", action, location.href());
                pending.change_was_blocked();
            }
            decision
        }))
    }
}

impl fmt::Debug for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blocker").finish_non_exhaustive()
    }
}

/// Wraps `confirmation` so that a negative answer rejects the pending round
/// trip before the source hears the answer.
#[must_use]
pub fn tracked_confirmation(
    confirmation: UserConfirmation,
    pending: PendingNavigation,
) -> UserConfirmation {
    Rc::new(move |message: &str, callback: ConfirmCallback| {
        let pending = pending.clone();
        let callback = callback.intercept(move |allowed| {
            if !allowed {
                pending.change_was_blocked();
            }
        });
        confirmation(message, callback);
    })
}
