//! # App History Core
//!
//! Application-level semantics over a linear, externally owned navigation
//! history: a depth counter that survives back/forward motion, a bounded
//! backlog of visited hrefs for reverse lookup, truncation of the forward
//! branch, single-flight navigation and suppressible change notification.
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`Suppressor`] | Reference-counted gate for internal navigation |
//! | [`Notifier`] | Fans out unwrapped location changes |
//! | [`meta`] | Encodes depth/backlog/cut bookkeeping into entry state |
//! | [`Mutator`] | One raw navigation in flight, settled by the next event |
//! | [`Scanner`] | Finds earlier entries through the backlog |
//! | [`Tracker`] | Caller-visible view, tombstone correction |
//! | [`Cutter`] | Clean and dirty truncation |
//! | [`Blocker`] | Block prompts that never veto internal navigation |
//! | [`Protector`] | Operation gate and lifecycle |
//! | [`Navigator`] | Back, forward, home and matcher-driven travel |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         AppHistory                           │
//! │                      ┌─────────────┐                         │
//! │                      │  Protector  │  one operation at a time │
//! │                      └──────┬──────┘                         │
//! │        ┌──────────┬─────────┼─────────┬──────────┐           │
//! │        ▼          ▼         ▼         ▼          ▼           │
//! │   Navigator    Cutter    Scanner   Tracker    Blocker        │
//! │        └──────────┴────┬────┴─────────┘          │           │
//! │                        ▼                         │           │
//! │                     Mutator ◄────── blocked ─────┘           │
//! │                        │                                     │
//! │           Suppressor ──┼── Notifier                          │
//! └────────────────────────┼─────────────────────────────────────┘
//!                          ▼
//!                   HistorySource (raw)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use apphistory_core::{AppHistory, AppHistoryConfig};
//!
//! # tokio_test::block_on(async {
//! let history = AppHistory::new(AppHistoryConfig::new().with_cache_limit(3));
//!
//! for path in ["a", "b", "c", "d", "e"] {
//!     history.push(path).await?;
//! }
//!
//! assert_eq!(history.find_last("/b").await?, Some(-3));
//! assert_eq!(history.find_last("/x").await?, None);
//! assert_eq!(history.location().pathname, "/e");
//! # Ok::<(), apphistory_core::HistoryError>(())
//! # }).unwrap();
//! ```
//!
//! ## Threading
//!
//! Everything here is single-threaded (`!Send`). Futures settle when the raw
//! source reports a change, so any executor that polls them works; the
//! in-memory source settles synchronously.

mod blocker;
mod config;
mod cutter;
mod error;
mod history;
pub mod meta;
mod mutator;
mod navigator;
mod notifier;
mod protector;
mod scanner;
mod suppressor;
mod tracker;

pub use blocker::{tracked_confirmation, BlockPrompt, Blocker};
pub use config::{AppHistoryConfig, DEFAULT_CACHE_LIMIT};
pub use cutter::Cutter;
pub use error::{HistoryError, Result};
pub use history::AppHistory;
pub use meta::{CutMarker, MetaState};
pub use mutator::{Mutator, PendingNavigation};
pub use navigator::Navigator;
pub use notifier::{HistoryListener, Notifier};
pub use protector::{IdleStatus, ProtectionMode, Protector, Status};
pub use scanner::{Matcher, ScanResult, Scanner};
pub use suppressor::{Suppression, Suppressor};
pub use tracker::Tracker;

// Re-export source types for convenience
pub use apphistory_source::{
    allow_all, deny_all, Action, ConfirmCallback, HistorySource, Location, LocationDescriptor, MemoryHistory,
    MemoryOptions, Registration, Transition, UserConfirmation,
};

#[cfg(test)]
mod tests;
