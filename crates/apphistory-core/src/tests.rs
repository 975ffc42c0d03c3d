//! Unit tests for apphistory-core.

#[test]
fn test_crate_structure() {
    // Smoke test - verifies the public surface fits together
    use crate::{AppHistory, AppHistoryConfig, BlockPrompt, Matcher, MetaState, Status};

    let history = AppHistory::new(AppHistoryConfig::default());
    assert_eq!(history.status(), Status::Created);
    assert_eq!(history.cache_limit(), Some(crate::DEFAULT_CACHE_LIMIT));
    assert_eq!(history.depth(), 0);

    let _prompt = BlockPrompt::from("leave?");
    let _matcher = Matcher::from("/");
    let _meta = MetaState::initial();
}
