//! Integration tests for the knowledge store.

use claude_sentinel::config::KnowledgeConfig;
use claude_sentinel::knowledge::{
    Category, KnowledgeEntry, KnowledgeStore, Priority, QueryKeywords,
};
use claude_sentinel::storage::StateDir;
use tempfile::TempDir;

async fn state_in(temp_dir: &TempDir) -> StateDir {
    let state = StateDir::at(temp_dir.path());
    state.ensure().await.expect("Failed to create state dir");
    state
}

fn store_over(state: &StateDir) -> KnowledgeStore {
    KnowledgeStore::new(state.clone(), KnowledgeConfig::default())
}

/// Test that entries added by one store instance are visible to another.
#[tokio::test]
async fn test_entries_persist_across_instances() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = state_in(&temp_dir).await;

    {
        let store = store_over(&state);
        store
            .add(
                KnowledgeEntry::new(
                    Category::Gotcha,
                    Priority::High,
                    "Retry storms",
                    "The payment API rate limits aggressively, back off exponentially",
                )
                .with_tags(["payments", "retry"]),
            )
            .await
            .expect("Failed to add");
    }

    let store = store_over(&state);
    let entries = store.entries(Category::Gotcha).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].title, "Retry storms");
    assert_eq!(entries[0].tags, vec!["payments", "retry"]);
}

/// Test that a tag match outranks a plain keyword match.
#[tokio::test]
async fn test_tag_match_outranks_keyword_match() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = state_in(&temp_dir).await;
    let store = store_over(&state);

    store
        .add(
            KnowledgeEntry::new(
                Category::Pattern,
                Priority::Medium,
                "Tagged entry",
                "Unrelated content about builders",
            )
            .with_tags(["caching"]),
        )
        .await
        .expect("Failed to add");
    store
        .add(KnowledgeEntry::new(
            Category::Pattern,
            Priority::Medium,
            "Keyword entry",
            "Mentions caching once in the body",
        ))
        .await
        .expect("Failed to add");

    let keywords = QueryKeywords::compile(["caching"]);
    let results = store.query_default(&keywords, &[Category::Pattern]).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].entry.title, "Tagged entry");
    assert!(results[0].score > results[1].score);
}

/// Test that recall is capped per category and ordered by score.
#[tokio::test]
async fn test_recall_respects_per_category_cap() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = state_in(&temp_dir).await;
    let store = KnowledgeStore::new(
        state.clone(),
        KnowledgeConfig {
            max_per_category: 2,
            ..KnowledgeConfig::default()
        },
    );

    for i in 0..5 {
        store
            .add(KnowledgeEntry::new(
                Category::Pattern,
                Priority::Medium,
                format!("Entry {i}"),
                "Connection pooling keeps latency flat",
            ))
            .await
            .expect("Failed to add");
    }

    let keywords = QueryKeywords::compile(["pooling"]);
    let results = store.query_default(&keywords, &[Category::Pattern]).await;
    assert_eq!(results.len(), 2);
    assert!(results[0].score >= results[1].score);
}

/// Test that recall bumps use counts and the summary surfaces them.
#[tokio::test]
async fn test_recall_accounting_feeds_summary() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = state_in(&temp_dir).await;
    let store = store_over(&state);

    store
        .add(KnowledgeEntry::new(
            Category::Solution,
            Priority::Medium,
            "Flaky clock",
            "Freeze time in tests with a fixed timestamp",
        ))
        .await
        .expect("Failed to add");

    let keywords = QueryKeywords::compile(["tests", "timestamp"]);
    for _ in 0..3 {
        let results = store.query_default(&keywords, &[Category::Solution]).await;
        assert_eq!(results.len(), 1);
    }

    let summary = store.summary().await;
    assert_eq!(summary.total, 1);
    let (title, uses) = &summary.most_used[0];
    assert_eq!(title, "Flaky clock");
    assert_eq!(*uses, 3);
}

/// Test that a corrupt collection file loads as empty instead of
/// failing the whole store.
#[tokio::test]
async fn test_corrupt_collection_degrades_to_empty() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = state_in(&temp_dir).await;
    let store = store_over(&state);

    store
        .add(KnowledgeEntry::new(
            Category::Gotcha,
            Priority::High,
            "Intact entry",
            "Gotchas live in their own collection",
        ))
        .await
        .expect("Failed to add");

    tokio::fs::write(state.knowledge_file("patterns"), "{broken json")
        .await
        .expect("Failed to corrupt file");

    assert!(store.entries(Category::Pattern).await.is_empty());
    assert_eq!(store.entries(Category::Gotcha).await.len(), 1);

    // Writing through the store replaces the corrupt file.
    store
        .add(KnowledgeEntry::new(
            Category::Pattern,
            Priority::Medium,
            "Fresh entry",
            "Collections recover on the next write",
        ))
        .await
        .expect("Failed to add");
    assert_eq!(store.entries(Category::Pattern).await.len(), 1);
}

/// Test that high priority recall spans every category.
#[tokio::test]
async fn test_high_priority_entries_span_categories() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = state_in(&temp_dir).await;
    let store = store_over(&state);

    store
        .add(KnowledgeEntry::new(
            Category::Gotcha,
            Priority::Critical,
            "Prod credentials",
            "Never point integration tests at the production bucket",
        ))
        .await
        .expect("Failed to add");
    store
        .add(KnowledgeEntry::new(
            Category::Correction,
            Priority::High,
            "Wrong hash",
            "Passwords use argon2 here, not bcrypt",
        ))
        .await
        .expect("Failed to add");
    store
        .add(KnowledgeEntry::new(
            Category::Pattern,
            Priority::Low,
            "Module layout",
            "One module per subsystem",
        ))
        .await
        .expect("Failed to add");

    let entries = store.high_priority_entries().await;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.priority <= Priority::High));
}
