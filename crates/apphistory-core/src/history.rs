//! # App History
//!
//! The facade that wires every component around one raw source and exposes
//! the caller-facing API.
//!
//! ## Operation Table
//!
//! | Operation | Gate | Notes |
//! |-----------|------|-------|
//! | `push`, `replace`, `go`, `go_back*`, `go_forward`, `go_home`, `cut`, `find_last` | Ready | starts tracking on first use |
//! | `init`, `suppress_while` | Idle | |
//! | `suppress`, `dispose` | Idle (sync) | |
//! | `block`, `listen`, `create_href`, getters | none | |
//!
//! Only one gated operation may be in flight; a second one fails with
//! [`HistoryError::ConcurrentOperation`](crate::HistoryError::ConcurrentOperation)
//! instead of queueing.

use crate::blocker::{tracked_confirmation, BlockPrompt, Blocker};
use crate::config::AppHistoryConfig;
use crate::cutter::Cutter;
use crate::error::Result;
use crate::mutator::{Mutator, PendingNavigation};
use crate::navigator::Navigator;
use crate::notifier::{HistoryListener, Notifier};
use crate::protector::{IdleStatus, ProtectionMode, Protector, Status};
use crate::scanner::{Matcher, Scanner};
use crate::suppressor::{Suppression, Suppressor};
use crate::tracker::Tracker;
use apphistory_source::{
    allow_all, Action, HistorySource, Location, LocationDescriptor, MemoryHistory, Registration,
    UserConfirmation,
};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use tracing::info;

/// A linear history with depth tracking, backlog lookup, cutting and guarded
/// navigation.
///
/// # Example
///
/// ```rust
/// use apphistory_core::{AppHistory, AppHistoryConfig};
///
/// # tokio_test::block_on(async {
/// let history = AppHistory::new(AppHistoryConfig::new());
///
/// history.push("/inbox").await?;
/// history.push("/inbox/42").await?;
/// assert_eq!(history.depth(), 2);
///
/// assert_eq!(history.find_last("/inbox").await?, Some(-1));
/// history.go_home(None).await?;
/// assert_eq!(history.location().pathname, "/");
/// # Ok::<(), apphistory_core::HistoryError>(())
/// # }).unwrap();
/// ```
pub struct AppHistory {
    cache_limit: Option<usize>,
    source: Rc<dyn HistorySource>,
    suppressor: Suppressor,
    mutator: Rc<Mutator>,
    notifier: Rc<Notifier>,
    tracker: Rc<Tracker>,
    scanner: Rc<Scanner>,
    cutter: Cutter,
    navigator: Navigator,
    blocker: Blocker,
    protector: Protector,
}

impl AppHistory {
    /// Creates an app history over an in-memory source whose confirmations
    /// always allow.
    #[must_use]
    pub fn new(config: AppHistoryConfig) -> Self {
        Self::with_source(config.clone(), None, |confirmation| {
            MemoryHistory::with_confirmation(config.memory, confirmation)
        })
    }

    /// Creates an app history over an in-memory source that asks
    /// `confirmation` when a block prompt wants the user to decide.
    #[must_use]
    pub fn with_confirmation(config: AppHistoryConfig, confirmation: UserConfirmation) -> Self {
        Self::with_source(config.clone(), Some(confirmation), |confirmation| {
            MemoryHistory::with_confirmation(config.memory, confirmation)
        })
    }

    /// Creates an app history over a source built by `factory`.
    ///
    /// `factory` receives the confirmation the source must use; it wraps
    /// `confirmation` (or an always-allow default) so that denials reach the
    /// pending navigation.
    pub fn with_source<S, F>(
        config: AppHistoryConfig,
        confirmation: Option<UserConfirmation>,
        factory: F,
    ) -> Self
    where
        S: HistorySource + 'static,
        F: FnOnce(UserConfirmation) -> Rc<S>,
    {
        let pending = PendingNavigation::new();
        let confirmation = tracked_confirmation(confirmation.unwrap_or_else(allow_all), pending.clone());
        let source: Rc<dyn HistorySource> = factory(confirmation);

        Self::assemble(source, pending, config.cache_limit)
    }

    fn assemble(
        source: Rc<dyn HistorySource>,
        pending: PendingNavigation,
        cache_limit: Option<usize>,
    ) -> Self {
        let suppressor = Suppressor::new();
        let mutator = Rc::new(Mutator::new(
            Rc::clone(&source),
            suppressor.clone(),
            pending.clone(),
            cache_limit,
        ));
        let notifier = Notifier::new(Rc::clone(&source), suppressor.clone());
        let tracker = Tracker::new(
            Rc::clone(&source),
            suppressor.clone(),
            Rc::clone(&mutator),
            Rc::clone(&notifier),
        );
        let scanner = Rc::new(Scanner::new(
            Rc::clone(&source),
            suppressor.clone(),
            Rc::clone(&mutator),
        ));
        let cutter = Cutter::new(Rc::clone(&source), suppressor.clone(), Rc::clone(&mutator));
        let navigator = Navigator::new(
            Rc::clone(&source),
            suppressor.clone(),
            Rc::clone(&mutator),
            Rc::clone(&scanner),
        );
        let blocker = Blocker::new(Rc::clone(&source), suppressor.clone(), pending);
        let protector = Protector::new(Rc::clone(&tracker));

        info!(
            "app history created at {} (cache limit {:?})",
            source.location().href(),
            cache_limit
        );

        Self {
            cache_limit,
            source,
            suppressor,
            mutator,
            notifier,
            tracker,
            scanner,
            cutter,
            navigator,
            blocker,
            protector,
        }
    }

    // ========================================================================
    // Observable state
    // ========================================================================

    /// Pushes since home, as tracked.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.tracker.depth()
    }

    /// Number of entries in the raw source.
    #[must_use]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// Returns true when the raw source has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// The action that produced the current location.
    #[must_use]
    pub fn action(&self) -> Action {
        self.tracker.action()
    }

    /// The current location, with caller state.
    #[must_use]
    pub fn location(&self) -> Location {
        self.tracker.location()
    }

    /// Maximum backlog hrefs per entry; `None` is unbounded.
    #[must_use]
    pub fn cache_limit(&self) -> Option<usize> {
        self.cache_limit
    }

    /// Returns true while notifications are suppressed.
    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.suppressor.is_active()
    }

    /// Returns true while an operation is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.protector.is_busy()
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.protector.status()
    }

    /// The raw source.
    #[must_use]
    pub fn source(&self) -> Rc<dyn HistorySource> {
        Rc::clone(&self.source)
    }

    /// Renders a location with the raw source's href rules.
    #[must_use]
    pub fn create_href(&self, location: &Location) -> String {
        self.source.create_href(location)
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Pushes a new entry.
    ///
    /// # Errors
    ///
    /// Returns an error if another operation is in flight, after dispose, or
    /// if the navigation is blocked.
    pub async fn push(&self, to: impl Into<LocationDescriptor>) -> Result<()> {
        let to = to.into();
        self.protector
            .run(ProtectionMode::Ready, None, || self.mutator.push(to))
            .await
    }

    /// Replaces the current entry.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub async fn replace(&self, to: impl Into<LocationDescriptor>) -> Result<()> {
        let to = to.into();
        self.protector
            .run(ProtectionMode::Ready, None, || self.mutator.replace(to))
            .await
    }

    /// Moves `delta` entries.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub async fn go(&self, delta: isize) -> Result<()> {
        self.protector
            .run(ProtectionMode::Ready, None, || self.navigator.go(delta))
            .await
    }

    /// Moves one entry back.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub async fn go_back(&self) -> Result<()> {
        self.go_back_to(None::<Matcher>, None).await.map(|_| ())
    }

    /// Goes back to the most recent entry matching `matcher`, optionally
    /// replacing its state. See [`Navigator::go_back_to`].
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub async fn go_back_to<M>(&self, matcher: Option<M>, state: Option<Value>) -> Result<bool>
    where
        M: Into<Matcher>,
    {
        let matcher = matcher.map(Into::into);
        self.protector
            .run(ProtectionMode::Ready, None, || {
                self.navigator.go_back_to(matcher, state)
            })
            .await
    }

    /// Moves one entry forward.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub async fn go_forward(&self) -> Result<()> {
        self.protector
            .run(ProtectionMode::Ready, None, || self.navigator.go_forward())
            .await
    }

    /// Goes home, then replaces the home entry with `target` if given.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub async fn go_home(&self, target: Option<LocationDescriptor>) -> Result<()> {
        self.protector
            .run(ProtectionMode::Ready, None, || self.navigator.go_home(target))
            .await
    }

    /// Drops every entry ahead of the current one. The current location
    /// does not change.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub async fn cut(&self) -> Result<()> {
        self.protector
            .run(ProtectionMode::Ready, None, || self.cutter.cut())
            .await
    }

    /// Offset to the most recent entry matching `matcher`, or `None`.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub async fn find_last(&self, matcher: impl Into<Matcher>) -> Result<Option<isize>> {
        let matcher = matcher.into();
        self.protector
            .run(ProtectionMode::Ready, None, || self.scanner.find_last(&matcher))
            .await
    }

    // ========================================================================
    // Lifecycle and suppression
    // ========================================================================

    /// Starts tracking. Other navigation operations do this on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if another operation is in flight or after dispose.
    pub async fn init(&self) -> Result<()> {
        self.protector
            .run(ProtectionMode::Idle, Some(IdleStatus::Ready), || async {
                self.tracker.start().await;
                Ok(())
            })
            .await
    }

    /// Stops tracking. Every gated operation fails afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if an operation is in flight or if already disposed.
    pub fn dispose(&self) -> Result<()> {
        self.protector
            .run_sync(ProtectionMode::Idle, Some(IdleStatus::Disposed), || {
                self.tracker.stop();
                info!("app history disposed");
            })
    }

    /// Waits until no operation is in flight.
    pub async fn when_idle(&self) {
        self.protector.when_idle().await;
    }

    /// Suppresses notifications until the returned guard is released or
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if an operation is in flight or after dispose.
    pub fn suppress(&self) -> Result<Suppression> {
        self.protector
            .run_sync(ProtectionMode::Idle, None, || self.suppressor.suppress())
    }

    /// Runs `action` with notifications suppressed. The action receives the
    /// raw source; the app history itself is busy until it completes.
    ///
    /// # Errors
    ///
    /// Returns an error if an operation is in flight or after dispose.
    pub async fn suppress_while<F, Fut, T>(&self, action: F) -> Result<T>
    where
        F: FnOnce(Rc<dyn HistorySource>) -> Fut,
        Fut: Future<Output = T>,
    {
        let source = Rc::clone(&self.source);
        self.protector
            .run(ProtectionMode::Idle, None, move || async move {
                Ok(self.suppressor.suppress_while(action(source)).await)
            })
            .await
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    /// Installs a block prompt, replacing any previous one.
    pub fn block(&self, prompt: impl Into<BlockPrompt>) -> Registration {
        self.blocker.block(prompt.into())
    }

    /// Registers a listener for caller-visible location changes.
    pub fn listen(&self, listener: HistoryListener) -> Registration {
        self.notifier.listen(listener)
    }
}

impl fmt::Debug for AppHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppHistory")
            .field("status", &self.status())
            .field("depth", &self.depth())
            .field("len", &self.len())
            .field("href", &self.location().href())
            .field("cache_limit", &self.cache_limit)
            .field("suppressed", &self.is_suppressed())
            .finish()
    }
}
