//! # Dirty Cut Tests
//!
//! A cut at home leaves a tombstone behind the current entry. These tests
//! walk back and forth across it and check where travel ends up.
//!
//! ```text
//!  index:   0          1            2
//!           /before    / (here)     / (before)
//!                      tombstone    current after the cut
//! ```
//!
//! Direction of the bounce is decided from the view before landing:
//!
//! | Tracked depth vs tombstone | After cut | Bounce |
//! |----------------------------|-----------|--------|
//! | greater | any | back |
//! | equal | yes | back |
//! | equal | no | forward |
//!
//! Travel that reaches a tombstone while suppressed is corrected as soon as
//! the suppression ends.

use apphistory_core::meta::{is_tombstone, meta_of, wrap_state};
use apphistory_core::{
    Action, AppHistory, AppHistoryConfig, CutMarker, HistorySource, Location, LocationDescriptor,
    MemoryHistory, MemoryOptions, MetaState,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

/// `/before` followed by the home entry `/`, cut dirty at home.
async fn fenced() -> AppHistory {
    let history = AppHistory::new(
        AppHistoryConfig::new()
            .with_initial_entries(["/before", "/"])
            .with_initial_index(1),
    );
    history.init().await.unwrap();
    history.cut().await.unwrap();
    history
}

fn record(history: &AppHistory) -> Rc<RefCell<Vec<(String, Action)>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let listener = {
        let seen = Rc::clone(&seen);
        Rc::new(move |location: &Location, action: Action| {
            seen.borrow_mut().push((location.href(), action));
        })
    };
    let _registration = history.listen(listener);
    seen
}

fn raw_entry(path: &str, cut: CutMarker) -> LocationDescriptor {
    let meta = MetaState::initial().with_cut(Some(cut));
    LocationDescriptor::path(path).with_state(wrap_state(json!({"v": 1}), &meta))
}

// ============================================================================
// Layout
// ============================================================================

#[tokio::test]
async fn test_dirty_cut_layout() {
    let history = fenced().await;
    let source = history.source();

    assert_eq!(source.len(), 3);
    assert_eq!(source.location().pathname, "/");
    assert!(meta_of(&source.location()).unwrap().is_after_cut());

    assert_eq!(history.depth(), 0);
    assert_eq!(history.location().pathname, "/");
    assert_eq!(history.location().state, json!(null));
    assert!(!history.is_suppressed());
}

// ============================================================================
// Bouncing
// ============================================================================

#[tokio::test]
async fn test_back_from_cut_skips_tombstone() {
    let history = fenced().await;
    let seen = record(&history);

    history.go_back().await.unwrap();

    assert_eq!(history.location().pathname, "/before");
    assert_eq!(history.action(), Action::Pop);
    assert_eq!(history.depth(), 0);
    assert!(!is_tombstone(&history.source().location()));
    assert_eq!(*seen.borrow(), vec![("/before".to_string(), Action::Pop)]);
}

#[tokio::test]
async fn test_forward_onto_tombstone_lands_after_cut() {
    let history = fenced().await;
    history.go_back().await.unwrap();
    let seen = record(&history);

    history.go_forward().await.unwrap();

    assert_eq!(history.location().pathname, "/");
    assert_eq!(history.source().len(), 3);
    assert!(meta_of(&history.source().location()).unwrap().is_after_cut());
    assert_eq!(*seen.borrow(), vec![("/".to_string(), Action::Pop)]);
}

#[tokio::test]
async fn test_deeper_travel_jumps_over_tombstone() {
    let history = fenced().await;
    history.push("/a").await.unwrap();
    assert_eq!(history.depth(), 1);
    let seen = record(&history);

    history.go(-2).await.unwrap();

    assert_eq!(history.location().pathname, "/before");
    assert_eq!(history.depth(), 0);
    assert_eq!(seen.borrow().len(), 1);
}

#[tokio::test]
async fn test_raw_travel_is_corrected() {
    let history = fenced().await;
    let seen = record(&history);

    history.source().go_back();

    assert_eq!(history.location().pathname, "/before");
    assert_eq!(*seen.borrow(), vec![("/before".to_string(), Action::Pop)]);

    history.source().go_forward();

    assert_eq!(history.location().pathname, "/");
    assert_eq!(seen.borrow().len(), 2);
}

#[tokio::test]
async fn test_tombstone_reached_while_suppressed_is_left_on_release() {
    let history = fenced().await;
    let seen = record(&history);

    let mut suppression = history.suppress().unwrap();
    history.source().go_back();
    assert!(is_tombstone(&history.source().location()));
    assert_eq!(history.location().pathname, "/");

    suppression.release();

    assert!(!is_tombstone(&history.source().location()));
    assert_eq!(history.location().pathname, "/before");
    assert!(!history.is_suppressed());
    assert_eq!(*seen.borrow(), vec![("/before".to_string(), Action::Pop)]);
}

#[tokio::test]
async fn test_bounce_at_start_of_history_stays_after_cut() {
    let history = AppHistory::new(AppHistoryConfig::new());
    history.init().await.unwrap();
    history.cut().await.unwrap();
    assert_eq!(history.source().len(), 2);

    history.go_back().await.unwrap();

    let source = history.source();
    assert_eq!(source.location().pathname, "/");
    assert!(meta_of(&source.location()).unwrap().is_after_cut());
    assert_eq!(history.location().pathname, "/");
    assert_eq!(history.depth(), 0);
}

// ============================================================================
// Cutting again
// ============================================================================

#[tokio::test]
async fn test_cut_after_dirty_cut_is_clean() {
    let history = fenced().await;
    history.push("/a").await.unwrap();
    history.go_back().await.unwrap();
    assert_eq!(history.source().len(), 4);

    history.cut().await.unwrap();

    let source = history.source();
    assert_eq!(source.len(), 3);
    assert_eq!(source.location().pathname, "/");
    assert!(meta_of(&source.location()).unwrap().is_after_cut());
    assert_eq!(history.depth(), 0);

    history.go_back().await.unwrap();
    assert_eq!(history.location().pathname, "/before");
}

#[tokio::test]
async fn test_repeated_cuts_keep_length() {
    let history = fenced().await;

    for _ in 0..3 {
        history.cut().await.unwrap();
        assert_eq!(history.source().len(), 3);
        assert_eq!(history.location().pathname, "/");
    }
}

// ============================================================================
// Initialization
// ============================================================================

#[tokio::test]
async fn test_init_on_tombstone_moves_forward() {
    let history = AppHistory::with_source(AppHistoryConfig::new(), None, |confirmation| {
        let source = MemoryHistory::with_confirmation(MemoryOptions::new(), confirmation);
        source.push(raw_entry("/home", CutMarker::Here));
        source.push(raw_entry("/home", CutMarker::Before));
        source.go_back();
        source
    });
    assert!(is_tombstone(&history.source().location()));

    history.init().await.unwrap();

    assert!(!is_tombstone(&history.source().location()));
    assert_eq!(history.location().pathname, "/home");
    assert_eq!(history.location().state, json!({"v": 1}));
    assert_eq!(history.depth(), 0);
}
