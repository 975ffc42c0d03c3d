//! The tracked, caller-visible view of the history.
//!
//! The tracker owns `(location, action, depth, after_dirty_cut)` and keeps it
//! in step with the raw source:
//!
//! | Raw event | Effect |
//! |-----------|--------|
//! | any, while suppressed | ignored (resynced when suppression ends) |
//! | suppression ends on a tombstone | bounce off it, as below |
//! | foreign location | `(location, action, 0, false)` |
//! | tombstone | bounce off it, then adopt where the bounce landed |
//! | wrapped location | adopt its depth and `cut == before` flag |
//!
//! ## Tombstone Correction
//!
//! A tombstone is never a destination. Landing on one means the user (or a
//! raw `go`) crossed a dirty cut boundary, and the direction of travel is
//! inferred from the view before the event:
//!
//! ```text
//!  tracked depth > tombstone depth            → go back
//!  tracked depth = tombstone depth, after cut → go back
//!  otherwise                                  → go forward
//! ```
//!
//! The bounce runs suppressed; the landing location is then announced to
//! listeners as a single change.

use crate::meta::{is_tombstone, meta_of, unwrap_location, wrap_location, MetaState};
use crate::mutator::Mutator;
use crate::notifier::Notifier;
use crate::suppressor::Suppressor;
use apphistory_source::{Action, HistorySource, Location, Registration};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone)]
struct TrackedView {
    location: Location,
    action: Action,
    depth: usize,
    after_dirty_cut: bool,
}

impl TrackedView {
    fn of(location: &Location, action: Action) -> Self {
        let meta = meta_of(location);
        Self {
            location: unwrap_location(location.clone()),
            action,
            depth: meta.as_ref().map_or(0, |meta| meta.depth),
            after_dirty_cut: meta.as_ref().is_some_and(MetaState::is_after_cut),
        }
    }
}

/// Keeps the caller-visible view in step with the raw source.
pub struct Tracker {
    this: Weak<Tracker>,
    source: Rc<dyn HistorySource>,
    suppressor: Suppressor,
    mutator: Rc<Mutator>,
    notifier: Rc<Notifier>,
    view: RefCell<TrackedView>,
    registrations: RefCell<Vec<Registration>>,
    started: Cell<bool>,
    correcting: Cell<bool>,
}

impl Tracker {
    /// Creates a tracker viewing the source's current entry. Nothing is
    /// observed until [`start`](Self::start).
    #[must_use]
    pub fn new(
        source: Rc<dyn HistorySource>,
        suppressor: Suppressor,
        mutator: Rc<Mutator>,
        notifier: Rc<Notifier>,
    ) -> Rc<Self> {
        let view = TrackedView::of(&source.location(), source.action());

        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            source,
            suppressor,
            mutator,
            notifier,
            view: RefCell::new(view),
            registrations: RefCell::new(Vec::new()),
            started: Cell::new(false),
            correcting: Cell::new(false),
        })
    }

    /// The current location, unwrapped.
    #[must_use]
    pub fn location(&self) -> Location {
        self.view.borrow().location.clone()
    }

    /// The action that produced the current location.
    #[must_use]
    pub fn action(&self) -> Action {
        self.view.borrow().action
    }

    /// Pushes since home.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.view.borrow().depth
    }

    /// Returns true when the current entry is the one after a dirty cut.
    #[must_use]
    pub fn is_after_dirty_cut(&self) -> bool {
        self.view.borrow().after_dirty_cut
    }

    /// Returns true once [`start`](Self::start) has run.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.get()
    }

    /// Starts observing the source.
    ///
    /// A tombstone under the cursor is corrected right away. A foreign entry
    /// is replaced by a wrapped copy of itself; if that replace is refused,
    /// tracking goes ahead on the foreign entry. Calling `start` again does
    /// nothing.
    pub async fn start(&self) {
        if self.started.replace(true) {
            return;
        }

        self.subscribe();
        self.resync();

        let location = self.source.location();
        match meta_of(&location) {
            Some(meta) if meta.is_tombstone() => self.correct(&meta),
            Some(_) => {}
            None => {
                let _suppression = self.suppressor.suppress();
                let wrapped = wrap_location(&location);
                if let Err(error) = self.mutator.update(|| self.source.replace(wrapped)).await {
                    warn!("could not wrap initial entry {}: {}", location.href(), error);
                }
            }
        }

        self.resync();
        debug!("tracking started at {} (depth {})", self.location().href(), self.depth());
    }

    /// Stops observing the source.
    pub fn stop(&self) {
        let registrations: Vec<Registration> = self.registrations.borrow_mut().drain(..).collect();
        for mut registration in registrations {
            registration.unregister();
        }
        debug!("tracking stopped");
    }

    fn subscribe(&self) {
        let on_change = {
            let this = self.this.clone();
            self.source.listen(Rc::new(move |location: &Location, action: Action| {
                if let Some(tracker) = this.upgrade() {
                    tracker.on_location_changed(location, action);
                }
            }))
        };

        let on_resume = {
            let this = self.this.clone();
            self.suppressor.on_resume(Rc::new(move || {
                if let Some(tracker) = this.upgrade() {
                    tracker.on_resumed();
                }
            }))
        };

        self.registrations.borrow_mut().extend([on_change, on_resume]);
    }

    fn on_location_changed(&self, location: &Location, action: Action) {
        if self.suppressor.is_active() {
            trace!("tracker ignoring {} to {} (suppressed)", action, location.href());
            return;
        }

        match meta_of(location) {
            Some(meta) if meta.is_tombstone() => self.correct(&meta),
            _ => self.adopt(location, action),
        }
    }

    /// Suppression has ended: events that arrived meanwhile were ignored, so
    /// the cursor may sit on a tombstone.
    fn on_resumed(&self) {
        match meta_of(&self.source.location()) {
            Some(meta) if meta.is_tombstone() && !self.correcting.get() => self.correct(&meta),
            _ => self.resync(),
        }
    }

    fn correct(&self, tombstone: &MetaState) {
        let (depth, after_dirty_cut) = {
            let view = self.view.borrow();
            (view.depth, view.after_dirty_cut)
        };

        let back = depth > tombstone.depth || (depth == tombstone.depth && after_dirty_cut);
        debug!(
            "landed on tombstone at depth {} from depth {}, bouncing {}",
            tombstone.depth,
            depth,
            if back { "back" } else { "forward" }
        );

        self.correcting.set(true);
        {
            let _suppression = self.suppressor.suppress();
            let step: isize = if back { -1 } else { 1 };
            self.source.go(step);

            // Clamped at either end of the history.
            if is_tombstone(&self.source.location()) {
                debug!("tombstone at the edge of history, bouncing the other way");
                self.source.go(-step);
            }
        }
        self.correcting.set(false);

        self.resync();

        let (location, action) = {
            let view = self.view.borrow();
            (view.location.clone(), view.action)
        };
        self.notifier.deliver(&location, action);
    }

    fn resync(&self) {
        self.adopt(&self.source.location(), self.source.action());
    }

    fn adopt(&self, location: &Location, action: Action) {
        self.view.replace(TrackedView::of(location, action));
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.view.borrow();
        f.debug_struct("Tracker")
            .field("href", &view.location.href())
            .field("action", &view.action)
            .field("depth", &view.depth)
            .field("after_dirty_cut", &view.after_dirty_cut)
            .field("started", &self.started.get())
            .finish()
    }
}
