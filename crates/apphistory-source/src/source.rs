//! The raw navigation provider seam.

use crate::listeners::Registration;
use crate::location::{Action, Location, LocationDescriptor};
use crate::transition::TransitionHook;
use std::rc::Rc;

/// Callback invoked after every location change.
pub type RawListener = Rc<dyn Fn(&Location, Action)>;

/// A linear navigation history owned by someone else.
///
/// This is the interface the app history layer consumes: a browser tab, an
/// embedded web view, or [`MemoryHistory`](crate::MemoryHistory) in tests.
///
/// # Reentrancy
///
/// All methods take `&self`. Implementations must not hold internal borrows
/// while calling listeners, hooks or confirmations: those callbacks are
/// allowed to call back into the source, including navigating from inside a
/// listener.
///
/// # Settlement
///
/// Every `push`, `replace` and `go` must eventually either notify listeners
/// or be denied by the transition check. A navigation that does neither
/// leaves whoever awaits it waiting.
pub trait HistorySource {
    /// The current entry.
    fn location(&self) -> Location;

    /// The action that produced the current entry.
    fn action(&self) -> Action;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Returns true when the history has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends an entry after the current one, discarding any forward entries.
    fn push(&self, to: LocationDescriptor);

    /// Overwrites the current entry.
    fn replace(&self, to: LocationDescriptor);

    /// Moves `delta` entries (negative is back).
    fn go(&self, delta: isize);

    /// Moves one entry back.
    fn go_back(&self) {
        self.go(-1);
    }

    /// Moves one entry forward.
    fn go_forward(&self) {
        self.go(1);
    }

    /// Subscribes to location changes.
    fn listen(&self, listener: RawListener) -> Registration;

    /// Installs a transition hook consulted before every navigation.
    fn block(&self, hook: TransitionHook) -> Registration;

    /// Renders a location as an href.
    fn create_href(&self, location: &Location) -> String {
        location.href()
    }
}
