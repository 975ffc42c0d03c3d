//! # History Source
//!
//! The raw navigation provider seam for app history: the types a linear
//! navigation history speaks in, the [`HistorySource`] trait the app history
//! layer consumes, and [`MemoryHistory`], an in-memory stand-in.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`Location`] / [`LocationDescriptor`] | Resolved entries and partial targets |
//! | [`HistorySource`] | Push/replace/go/listen/block provider interface |
//! | [`MemoryHistory`] | Vector-backed provider for tests and headless use |
//! | [`Listeners`] / [`Registration`] | Token-based listener registry |
//! | [`Transition`] / [`UserConfirmation`] | Block hooks and confirmation |
//!
//! ## Quick Start
//!
//! ```rust
//! use apphistory_source::{Action, HistorySource, MemoryHistory, MemoryOptions};
//!
//! let history = MemoryHistory::new(MemoryOptions::new());
//! history.push("inbox".into());
//!
//! assert_eq!(history.location().pathname, "/inbox");
//! assert_eq!(history.action(), Action::Push);
//! ```
//!
//! ## Reentrancy
//!
//! Sources are single-threaded and reentrant: listeners may navigate from
//! inside a notification. Everything here is `!Send`; drive it from one
//! thread.

mod listeners;
mod location;
mod memory;
mod source;
mod transition;

pub use listeners::{ListenerId, Listeners, Registration};
pub use location::{create_path, parse_path, resolve_pathname, Action, Location, LocationDescriptor};
pub use memory::{MemoryHistory, MemoryOptions};
pub use source::{HistorySource, RawListener};
pub use transition::{allow_all, deny_all, ConfirmCallback, Transition, TransitionHook, UserConfirmation};
