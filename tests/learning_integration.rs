//! Integration tests for learning state persisted under the state
//! directory.

use claude_sentinel::config::{LearningConfig, TriggerConfig};
use claude_sentinel::learning::{AcceptanceStats, CategoryStats, LearningEngine, ReviewDecision};
use claude_sentinel::monitor::TriggerKind;
use claude_sentinel::storage::{JsonStore, StateDir};
use tempfile::TempDir;

async fn state_in(temp_dir: &TempDir) -> StateDir {
    let state = StateDir::at(temp_dir.path());
    state.ensure().await.expect("Failed to create state dir");
    state
}

fn engine_over(state: &StateDir) -> LearningEngine {
    LearningEngine::new(
        state.clone(),
        LearningConfig::default(),
        TriggerConfig::default(),
    )
}

/// Test that decisions recorded by one engine are visible to the next.
#[tokio::test]
async fn test_stats_and_rejections_survive_new_engine() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = state_in(&temp_dir).await;

    {
        let engine = engine_over(&state);
        engine
            .record(&ReviewDecision::accept("testing", "Add a timeout test"))
            .await
            .expect("Failed to record");
        engine
            .record(&ReviewDecision::accept("testing", "Cover the empty case"))
            .await
            .expect("Failed to record");
        engine
            .record(&ReviewDecision::reject(
                "testing",
                "Delete the flaky test",
                Some("fix it instead".to_string()),
            ))
            .await
            .expect("Failed to record");
    }

    let engine = engine_over(&state);
    let stats = engine.stats().await;
    let cat = &stats.by_category["testing"];
    assert_eq!(cat.accepted, 2);
    assert_eq!(cat.rejected, 1);
    assert!((cat.rate - 0.5355).abs() < 1e-9);

    let log = engine.rejections().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log.records[0].text, "Delete the flaky test");
    assert_eq!(log.records[0].reason.as_deref(), Some("fix it instead"));
}

/// Test that threshold adaptation lands in the overlay and a fresh
/// engine picks it up, leaving unrelated thresholds alone.
#[tokio::test]
async fn test_adapted_thresholds_survive_new_engine() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = state_in(&temp_dir).await;
    let baseline = TriggerConfig::default();

    {
        let engine = engine_over(&state);
        for _ in 0..5 {
            engine
                .record(&ReviewDecision::reject(
                    "refactoring",
                    "Extract this into a trait",
                    Some("too invasive".to_string()),
                ))
                .await
                .expect("Failed to record");
        }
    }

    let engine = engine_over(&state);
    let effective = engine.effective_thresholds().await;
    assert_eq!(
        effective.file_churn_threshold,
        baseline.file_churn_threshold + 5
    );
    assert_eq!(effective.lines_threshold, baseline.lines_threshold);
}

/// Test that recommending moves reads history but writes nothing.
#[tokio::test]
async fn test_recommend_is_a_dry_run_on_disk() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = state_in(&temp_dir).await;

    let mut stats = AcceptanceStats::default();
    for _ in 0..5 {
        stats.observe("security", false, LearningConfig::default().learning_speed);
    }
    JsonStore::new(state.acceptance_file())
        .save(&stats)
        .await
        .expect("Failed to save stats");

    let engine = engine_over(&state);
    let deltas = engine.recommend().await;
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].kind, TriggerKind::LinesWritten);
    assert!(deltas[0].is_raise());
    assert!((deltas[0].proposed - 52.0).abs() < f64::EPSILON);
    assert!(!state.tuning_file().exists());
}

/// Test that adjusting moves every out-of-band category in one pass
/// and the result persists.
#[tokio::test]
async fn test_adjust_covers_multiple_trigger_kinds() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = state_in(&temp_dir).await;

    let mut stats = AcceptanceStats::default();
    stats.by_category.insert(
        "security".to_string(),
        CategoryStats {
            accepted: 3,
            rejected: 7,
            rate: 0.30,
        },
    );
    stats.by_category.insert(
        "refactoring".to_string(),
        CategoryStats {
            accepted: 9,
            rejected: 1,
            rate: 0.90,
        },
    );
    JsonStore::new(state.acceptance_file())
        .save(&stats)
        .await
        .expect("Failed to save stats");

    let deltas = engine_over(&state).adjust().await.expect("Adjust failed");
    assert_eq!(deltas.len(), 2);

    let effective = engine_over(&state).effective_thresholds().await;
    assert_eq!(effective.lines_threshold, 52);
    assert_eq!(effective.file_churn_threshold, 4);
}

/// Test that a configured baseline is the fallback when nothing has
/// been learned yet.
#[tokio::test]
async fn test_custom_baseline_is_the_fallback() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = state_in(&temp_dir).await;

    let baseline = TriggerConfig {
        lines_threshold: 80,
        ..TriggerConfig::default()
    };
    let engine = LearningEngine::new(state, LearningConfig::default(), baseline.clone());
    assert_eq!(engine.effective_thresholds().await, baseline);
}
