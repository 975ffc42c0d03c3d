//! Operation gate and lifecycle.
//!
//! Every public operation of the app history runs inside the protector, which
//! admits one operation at a time and tracks the lifecycle:
//!
//! ```text
//!            init / first Ready-mode op            dispose
//!  Created ───────────────────────────► Ready ────────────► Disposed
//!     │                                   │
//!     └───────────── Busy (while any operation is in flight) ┘
//! ```
//!
//! ## Modes
//!
//! | Mode | Rejected when disposed | Starts the tracker first |
//! |------|------------------------|--------------------------|
//! | [`ProtectionMode::Ready`] | yes | yes |
//! | [`ProtectionMode::Idle`] | yes | no |
//! | [`ProtectionMode::Any`] | no | no |
//!
//! Entering while busy always fails with
//! [`HistoryError::ConcurrentOperation`]. Leaving an operation, however it
//! ends, clears the busy flag and wakes every [`Protector::when_idle`] waiter.

use crate::error::{HistoryError, Result};
use crate::tracker::Tracker;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Observable lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Constructed; the tracker has not started.
    Created,
    /// Tracking and idle.
    Ready,
    /// An operation is in flight.
    Busy,
    /// Disposed; only teardown-tolerant operations are admitted.
    Disposed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Ready => "ready",
            Self::Busy => "busy",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// The status an operation leaves behind when it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStatus {
    /// Not started.
    Created,
    /// Started.
    Ready,
    /// Torn down.
    Disposed,
}

impl From<IdleStatus> for Status {
    fn from(status: IdleStatus) -> Self {
        match status {
            IdleStatus::Created => Self::Created,
            IdleStatus::Ready => Self::Ready,
            IdleStatus::Disposed => Self::Disposed,
        }
    }
}

/// How an operation is admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionMode {
    /// Start the tracker first if needed.
    Ready,
    /// Run as is.
    Idle,
    /// Run as is, even after dispose.
    Any,
}

/// Admits one operation at a time.
pub struct Protector {
    tracker: Rc<Tracker>,
    busy: Cell<bool>,
    idle: Cell<IdleStatus>,
    waiters: RefCell<Vec<oneshot::Sender<()>>>,
}

struct Admission<'a> {
    protector: &'a Protector,
    then: Option<IdleStatus>,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.protector.exit(self.then);
    }
}

impl Protector {
    /// Creates a protector in the `Created` status.
    #[must_use]
    pub fn new(tracker: Rc<Tracker>) -> Self {
        Self {
            tracker,
            busy: Cell::new(false),
            idle: Cell::new(IdleStatus::Created),
            waiters: RefCell::new(Vec::new()),
        }
    }

    /// Current status. `Busy` takes precedence over the idle status.
    #[must_use]
    pub fn status(&self) -> Status {
        if self.busy.get() {
            Status::Busy
        } else {
            self.idle.get().into()
        }
    }

    /// Returns true while an operation is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Runs a synchronous operation.
    ///
    /// `then`, if given, becomes the idle status once `op` returns.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::ConcurrentOperation`] or
    /// [`HistoryError::Disposed`] if the operation is not admitted.
    pub fn run_sync<T>(
        &self,
        mode: ProtectionMode,
        then: Option<IdleStatus>,
        op: impl FnOnce() -> T,
    ) -> Result<T> {
        let _admission = self.enter(mode, then)?;
        Ok(op())
    }

    /// Runs an asynchronous operation.
    ///
    /// In [`ProtectionMode::Ready`] the tracker is started first if it has
    /// not been, and the status becomes `Ready`.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::ConcurrentOperation`] or
    /// [`HistoryError::Disposed`] if the operation is not admitted, and
    /// otherwise whatever `op` returns.
    pub async fn run<T, F, Fut>(
        &self,
        mode: ProtectionMode,
        then: Option<IdleStatus>,
        op: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _admission = self.enter(mode, then)?;

        if mode == ProtectionMode::Ready && !self.tracker.is_started() {
            self.tracker.start().await;
            self.idle.set(IdleStatus::Ready);
        }

        op().await
    }

    /// Waits until no operation is in flight.
    pub async fn when_idle(&self) {
        if !self.busy.get() {
            return;
        }

        let (sender, receiver) = oneshot::channel();
        self.waiters.borrow_mut().push(sender);
        let _ = receiver.await;
    }

    fn enter(&self, mode: ProtectionMode, then: Option<IdleStatus>) -> Result<Admission<'_>> {
        if self.busy.get() {
            warn!("rejected operation: another operation is in flight");
            return Err(HistoryError::ConcurrentOperation);
        }

        if mode != ProtectionMode::Any && self.idle.get() == IdleStatus::Disposed {
            warn!("rejected operation: history is disposed");
            return Err(HistoryError::Disposed);
        }

        self.busy.set(true);
        Ok(Admission {
            protector: self,
            then,
        })
    }

    fn exit(&self, then: Option<IdleStatus>) {
        if let Some(status) = then {
            debug!("status -> {}", Status::from(status));
            self.idle.set(status);
        }

        self.busy.set(false);

        let waiters: Vec<oneshot::Sender<()>> = self.waiters.borrow_mut().drain(..).collect();
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}

impl fmt::Debug for Protector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protector")
            .field("status", &self.status())
            .field("waiters", &self.waiters.borrow().len())
            .finish()
    }
}
