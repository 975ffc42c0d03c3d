//! Error types for app history operations.
//!
//! Only two families of failure exist: misuse of the operation gate
//! (concurrency, use after dispose) and navigations that did not happen
//! (blocked, interrupted). Malformed bookkeeping found in history entries is
//! NOT an error: such entries are read as foreign, depth-zero locations.

use thiserror::Error;

/// Result type alias for app history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Errors that can occur while operating an app history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// A public operation was started while another one was in flight.
    ///
    /// This is a programming error; retrying blindly will not help.
    #[error("concurrent operation not allowed")]
    ConcurrentOperation,

    /// An operation was attempted after `dispose`.
    #[error("operation not allowed after dispose")]
    Disposed,

    /// A raw navigation was issued while another one awaited its outcome.
    #[error("concurrent navigation not supported")]
    ConcurrentNavigation,

    /// The navigation was vetoed by a block hook or the user.
    #[error("navigation was blocked")]
    NavigationBlocked,

    /// The pending navigation lost its resolver before it settled.
    #[error("navigation interrupted before the history source responded")]
    NavigationInterrupted,
}

impl HistoryError {
    /// Returns true for errors caused by calling the API wrongly rather than
    /// by the navigation itself.
    #[must_use]
    pub const fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentOperation | Self::Disposed | Self::ConcurrentNavigation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            HistoryError::ConcurrentOperation.to_string(),
            "concurrent operation not allowed"
        );
        assert_eq!(HistoryError::NavigationBlocked.to_string(), "navigation was blocked");
    }

    #[test]
    fn test_misuse_classification() {
        assert!(HistoryError::Disposed.is_misuse());
        assert!(HistoryError::ConcurrentNavigation.is_misuse());
        assert!(!HistoryError::NavigationBlocked.is_misuse());
        assert!(!HistoryError::NavigationInterrupted.is_misuse());
    }
}
