//! Truncation of the forward branch.
//!
//! ## Strategies
//!
//! | Strategy | When | Raw calls |
//! |----------|------|-----------|
//! | Clean | wrapped, and depth > 0 or `cut == before` | `go_back`, `push(current)` |
//! | Dirty | otherwise (home, or foreign) | `replace(tombstone)`, `push(current)` |
//!
//! A clean cut steps back and pushes the current entry again, meta and all,
//! which overwrites everything that was ahead. At home there is nowhere to
//! step back to, so a dirty cut turns the current entry into a tombstone and
//! pushes a copy after it. The tracker bounces off the tombstone whenever
//! travel lands on it.
//!
//! Both strategies run suppressed: listeners see nothing, and the tracked
//! location is the same before and after.

use crate::error::Result;
use crate::meta::{meta_of, unwrap_state, wrap_state, CutMarker};
use crate::mutator::Mutator;
use crate::suppressor::Suppressor;
use apphistory_source::{HistorySource, LocationDescriptor};
use std::rc::Rc;
use tracing::debug;

/// Performs clean and dirty cuts.
pub struct Cutter {
    source: Rc<dyn HistorySource>,
    suppressor: Suppressor,
    mutator: Rc<Mutator>,
}

impl Cutter {
    /// Creates a cutter.
    #[must_use]
    pub fn new(source: Rc<dyn HistorySource>, suppressor: Suppressor, mutator: Rc<Mutator>) -> Self {
        Self {
            source,
            suppressor,
            mutator,
        }
    }

    /// Drops every entry ahead of the current one.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the raw navigations fails or is blocked.
    pub async fn cut(&self) -> Result<()> {
        self.suppressor
            .suppress_while(async {
                if self.can_make_clean_cut() {
                    self.make_clean_cut().await
                } else {
                    self.make_dirty_cut().await
                }
            })
            .await
    }

    /// Returns true if the next cut can rewrite history in place.
    #[must_use]
    pub fn can_make_clean_cut(&self) -> bool {
        meta_of(&self.source.location()).is_some_and(|meta| meta.depth > 0 || meta.is_after_cut())
    }

    async fn make_clean_cut(&self) -> Result<()> {
        let current = self.source.location().without_key();
        debug!("clean cut at {}", current.href());

        self.mutator.update(|| self.source.go_back()).await?;
        self.mutator
            .update(|| self.source.push(LocationDescriptor::from(current)))
            .await
    }

    async fn make_dirty_cut(&self) -> Result<()> {
        let current = self.source.location().without_key();
        let meta = meta_of(&current).unwrap_or_default();
        let data = unwrap_state(current.state.clone());
        debug!("dirty cut at {} (depth {})", current.href(), meta.depth);

        let tombstone = LocationDescriptor::from(&current)
            .with_state(wrap_state(data.clone(), &meta.clone().with_cut(Some(CutMarker::Here))));
        let after = LocationDescriptor::from(current)
            .with_state(wrap_state(data, &meta.with_cut(Some(CutMarker::Before))));

        self.mutator.update(|| self.source.replace(tombstone)).await?;
        self.mutator.update(|| self.source.push(after)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{is_tombstone, MetaState};
    use crate::mutator::PendingNavigation;
    use apphistory_source::{MemoryHistory, MemoryOptions};
    use serde_json::json;

    fn setup() -> (Rc<MemoryHistory>, Suppressor, Rc<Mutator>, Cutter) {
        let source = MemoryHistory::new(MemoryOptions::new());
        let raw: Rc<dyn HistorySource> = source.clone();
        let suppressor = Suppressor::new();
        let mutator = Rc::new(Mutator::new(
            Rc::clone(&raw),
            suppressor.clone(),
            PendingNavigation::new(),
            Some(20),
        ));
        let cutter = Cutter::new(raw, suppressor.clone(), Rc::clone(&mutator));
        (source, suppressor, mutator, cutter)
    }

    #[tokio::test]
    async fn test_clean_cut_drops_forward_entries() {
        let (source, suppressor, mutator, cutter) = setup();
        mutator.push("/a".into()).await.unwrap();
        mutator.push("/b".into()).await.unwrap();
        mutator.go(-1).await.unwrap();
        assert!(cutter.can_make_clean_cut());

        cutter.cut().await.unwrap();

        assert_eq!(source.len(), 2);
        assert_eq!(source.location().pathname, "/a");
        assert_eq!(meta_of(&source.location()).unwrap().depth, 1);
        assert!(!suppressor.is_active());
    }

    #[tokio::test]
    async fn test_dirty_cut_at_home() {
        let (source, _, mutator, cutter) = setup();
        mutator.replace(LocationDescriptor::path("/").with_state(json!({"k": 1}))).await.unwrap();
        mutator.push("/a".into()).await.unwrap();
        mutator.go(-1).await.unwrap();
        assert!(!cutter.can_make_clean_cut());

        cutter.cut().await.unwrap();

        let entries = source.entries();
        assert_eq!(entries.len(), 2);
        assert!(is_tombstone(&entries[0]));

        let current = source.location();
        let meta = meta_of(&current).unwrap();
        assert_eq!(meta, MetaState::initial().with_cut(Some(CutMarker::Before)));
        assert_eq!(unwrap_state(current.state), json!({"k": 1}));
    }

    #[tokio::test]
    async fn test_cut_after_dirty_cut_is_clean() {
        let (source, _, mutator, cutter) = setup();
        mutator.replace("/".into()).await.unwrap();
        cutter.cut().await.unwrap();
        assert!(cutter.can_make_clean_cut());

        cutter.cut().await.unwrap();
        assert_eq!(source.len(), 2);
        assert!(meta_of(&source.location()).unwrap().is_after_cut());
    }
}
