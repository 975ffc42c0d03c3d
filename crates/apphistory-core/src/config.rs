//! Configuration types for app history.

use apphistory_source::MemoryOptions;
use serde::{Deserialize, Serialize};

/// Default number of backlog hrefs kept in each entry.
pub const DEFAULT_CACHE_LIMIT: usize = 20;

/// Configuration for an [`AppHistory`](crate::AppHistory).
///
/// # Example
///
/// ```rust
/// use apphistory_core::AppHistoryConfig;
///
/// let config = AppHistoryConfig::new()
///     .with_cache_limit(3)
///     .with_initial_entries(["/", "/inbox"]);
///
/// assert_eq!(config.cache_limit, Some(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppHistoryConfig {
    /// Maximum number of backlog hrefs stored per entry. `None` is unbounded.
    pub cache_limit: Option<usize>,

    /// Initial contents of the in-memory source.
    pub memory: MemoryOptions,
}

impl AppHistoryConfig {
    /// Creates a config with default values.
    ///
    /// Defaults:
    /// - Cache limit: 20 hrefs
    /// - Memory source: a single entry at `/`
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache_limit: Some(DEFAULT_CACHE_LIMIT),
            memory: MemoryOptions::new(),
        }
    }

    /// Sets the cache limit.
    #[must_use]
    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = Some(limit);
        self
    }

    /// Removes the cache limit: every entry remembers its whole backlog.
    #[must_use]
    pub fn with_unbounded_cache(mut self) -> Self {
        self.cache_limit = None;
        self
    }

    /// Sets the initial entries of the in-memory source.
    #[must_use]
    pub fn with_initial_entries<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.memory = self.memory.with_initial_entries(entries);
        self
    }

    /// Sets the initial current entry of the in-memory source.
    #[must_use]
    pub fn with_initial_index(mut self, index: usize) -> Self {
        self.memory = self.memory.with_initial_index(index);
        self
    }
}

impl Default for AppHistoryConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppHistoryConfig::default();
        assert_eq!(config.cache_limit, Some(20));
        assert_eq!(config.memory.initial_entries, vec!["/".to_string()]);
        assert_eq!(config.memory.initial_index, None);
    }

    #[test]
    fn test_config_builder() {
        let config = AppHistoryConfig::new()
            .with_unbounded_cache()
            .with_initial_entries(["/a", "/b"])
            .with_initial_index(0);

        assert_eq!(config.cache_limit, None);
        assert_eq!(config.memory.initial_entries.len(), 2);
        assert_eq!(config.memory.initial_index, Some(0));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppHistoryConfig::new().with_cache_limit(7);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppHistoryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppHistoryConfig = serde_json::from_str(r#"{"cache_limit": null}"#).unwrap();
        assert_eq!(parsed.cache_limit, None);
        assert_eq!(parsed.memory, MemoryOptions::new());
    }
}
