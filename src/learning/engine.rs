//! Learning engine.
//!
//! Every review decision folds into the acceptance statistics, and the
//! statistics steer the trigger thresholds: a category that keeps getting
//! rejected raises its associated threshold (review less), one that keeps
//! getting accepted lowers it (review more). Adapted thresholds live in a
//! state-directory overlay; the configured values are never rewritten.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{LearningConfig, TriggerConfig};
use crate::monitor::TriggerKind;
use crate::storage::{FileLock, JsonStore, StateDir, StorageError};

use super::stats::{AcceptanceStats, RejectionLog, RejectionRecord, ReviewDecision};

/// Half-width of the acceptance band around the target rate.
const RATE_DEADBAND: f64 = 0.1;

/// Smallest move for the count thresholds.
const COUNT_STEP_FLOOR: f64 = 1.0;

/// Smallest move for the context-usage fraction.
const FRACTION_STEP_FLOOR: f64 = 0.01;

/// Rejections before a category can be flagged as an anti-pattern.
const ANTI_PATTERN_MIN_REJECTIONS: usize = 5;

/// Share of the recent log a flagged category must account for.
const ANTI_PATTERN_MIN_SHARE: f64 = 0.8;

fn default_version() -> u32 {
    1
}

/// Persisted threshold overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub thresholds: Option<TriggerConfig>,
}

impl Default for TuningState {
    fn default() -> Self {
        Self {
            version: default_version(),
            thresholds: None,
        }
    }
}

/// One proposed threshold move.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdDelta {
    pub kind: TriggerKind,
    pub category: String,
    pub rate: f64,
    pub current: f64,
    pub proposed: f64,
}

impl ThresholdDelta {
    #[must_use]
    pub fn is_raise(&self) -> bool {
        self.proposed > self.current
    }
}

/// A category whose suggestions the reviewer almost always rejects.
#[derive(Debug, Clone, PartialEq)]
pub struct AntiPattern {
    pub category: String,
    pub count: usize,
    pub share: f64,
}

/// Aggregated rejection analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearningInsights {
    /// Rejection reasons with counts, most frequent first.
    pub reason_counts: Vec<(String, usize)>,
    /// Rejected categories with counts, most frequent first.
    pub category_counts: Vec<(String, usize)>,
    pub anti_patterns: Vec<AntiPattern>,
}

/// Folds decisions into stats and adapts thresholds.
#[derive(Debug, Clone)]
pub struct LearningEngine {
    state: StateDir,
    config: LearningConfig,
    baseline: TriggerConfig,
}

impl LearningEngine {
    #[must_use]
    pub fn new(state: StateDir, config: LearningConfig, baseline: TriggerConfig) -> Self {
        Self {
            state,
            config,
            baseline,
        }
    }

    fn stats_store(&self) -> JsonStore<AcceptanceStats> {
        JsonStore::new(self.state.acceptance_file())
    }

    fn rejection_store(&self) -> JsonStore<RejectionLog> {
        JsonStore::new(self.state.rejections_file())
    }

    fn tuning_store(&self) -> JsonStore<TuningState> {
        JsonStore::new(self.state.tuning_file())
    }

    pub async fn stats(&self) -> AcceptanceStats {
        self.stats_store().load().await
    }

    pub async fn rejections(&self) -> RejectionLog {
        self.rejection_store().load().await
    }

    /// Current thresholds: the adapted overlay when present, the
    /// configured baseline otherwise.
    pub async fn effective_thresholds(&self) -> TriggerConfig {
        self.tuning_store()
            .load()
            .await
            .thresholds
            .unwrap_or_else(|| self.baseline.clone())
    }

    /// Fold one decision in: update the stats, log the rejection if there
    /// was one, then adapt the category's associated threshold.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when a record cannot be locked or written.
    pub async fn record(&self, decision: &ReviewDecision) -> Result<(), StorageError> {
        let stats_store = self.stats_store();
        let stats = {
            let _lock = FileLock::acquire(stats_store.lock_path()).await?;
            let mut stats = stats_store.load().await;
            stats.observe(
                &decision.category,
                decision.accepted,
                self.config.learning_speed,
            );
            stats_store.save(&stats).await?;
            stats
        };

        if !decision.accepted {
            let store = self.rejection_store();
            let _lock = FileLock::acquire(store.lock_path()).await?;
            let mut log = store.load().await;
            log.push(RejectionRecord::new(
                &decision.category,
                &decision.text,
                decision.reason.clone(),
            ));
            store.save(&log).await?;
        }

        self.adapt(&stats, &decision.category).await
    }

    /// Move the category's associated threshold if its rate sits outside
    /// the deadband.
    async fn adapt(&self, stats: &AcceptanceStats, category: &str) -> Result<(), StorageError> {
        let Some(rate) = stats.rate_for(category) else {
            return Ok(());
        };

        let kind = TriggerKind::for_category(category);
        let store = self.tuning_store();
        let _lock = FileLock::acquire(store.lock_path()).await?;
        let mut tuning = store.load().await;
        let mut thresholds = tuning
            .thresholds
            .take()
            .unwrap_or_else(|| self.baseline.clone());

        let current = threshold_value(&thresholds, kind);
        if let Some(proposed) = proposed_value(
            current,
            kind,
            rate,
            self.config.target_acceptance_rate,
            self.config.learning_speed,
        ) {
            set_threshold_value(&mut thresholds, kind, proposed);
            tracing::info!(
                category,
                kind = %kind,
                from = current,
                to = proposed,
                rate,
                "Adapted trigger threshold"
            );
        }

        tuning.thresholds = Some(thresholds);
        store.save(&tuning).await
    }

    /// Dry run: the moves `record` would make for every category with
    /// history, without touching disk.
    pub async fn recommend(&self) -> Vec<ThresholdDelta> {
        let stats = self.stats().await;
        let thresholds = self.effective_thresholds().await;

        let mut deltas = Vec::new();
        for (category, cat_stats) in &stats.by_category {
            let kind = TriggerKind::for_category(category);
            let current = threshold_value(&thresholds, kind);
            if let Some(proposed) = proposed_value(
                current,
                kind,
                cat_stats.rate,
                self.config.target_acceptance_rate,
                self.config.learning_speed,
            ) {
                deltas.push(ThresholdDelta {
                    kind,
                    category: category.clone(),
                    rate: cat_stats.rate,
                    current,
                    proposed,
                });
            }
        }
        deltas
    }

    /// Apply every recommended move to the overlay.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the overlay cannot be locked or written.
    pub async fn adjust(&self) -> Result<Vec<ThresholdDelta>, StorageError> {
        let deltas = self.recommend().await;
        if deltas.is_empty() {
            return Ok(deltas);
        }

        let store = self.tuning_store();
        let _lock = FileLock::acquire(store.lock_path()).await?;
        let mut tuning = store.load().await;
        let mut thresholds = tuning
            .thresholds
            .take()
            .unwrap_or_else(|| self.baseline.clone());
        for delta in &deltas {
            set_threshold_value(&mut thresholds, delta.kind, delta.proposed);
        }
        tuning.thresholds = Some(thresholds);
        store.save(&tuning).await?;
        Ok(deltas)
    }

    /// Aggregate the rejection log into reasons, categories and
    /// anti-pattern flags.
    pub async fn insights(&self) -> LearningInsights {
        insights_from(&self.rejections().await)
    }
}

/// Threshold bounds per trigger kind.
fn bounds(kind: TriggerKind) -> (f64, f64) {
    match kind {
        TriggerKind::LinesWritten => (20.0, 500.0),
        TriggerKind::RepeatedError => (2.0, 10.0),
        TriggerKind::FileChurn => (3.0, 15.0),
        TriggerKind::RepeatedCorrections => (2.0, 10.0),
        TriggerKind::ContextUsage => (0.5, 0.95),
    }
}

fn threshold_value(thresholds: &TriggerConfig, kind: TriggerKind) -> f64 {
    match kind {
        TriggerKind::LinesWritten => f64::from(thresholds.lines_threshold),
        TriggerKind::RepeatedError => f64::from(thresholds.error_repeat_threshold),
        TriggerKind::FileChurn => f64::from(thresholds.file_churn_threshold),
        TriggerKind::RepeatedCorrections => f64::from(thresholds.correction_threshold),
        TriggerKind::ContextUsage => thresholds.context_warning_percent,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn set_threshold_value(thresholds: &mut TriggerConfig, kind: TriggerKind, value: f64) {
    match kind {
        TriggerKind::LinesWritten => thresholds.lines_threshold = value.round() as u32,
        TriggerKind::RepeatedError => thresholds.error_repeat_threshold = value.round() as u32,
        TriggerKind::FileChurn => thresholds.file_churn_threshold = value.round() as u32,
        TriggerKind::RepeatedCorrections => thresholds.correction_threshold = value.round() as u32,
        TriggerKind::ContextUsage => thresholds.context_warning_percent = value,
    }
}

/// The value the threshold should move to, or `None` when the rate sits
/// inside the deadband or the relevant bound is already reached.
fn proposed_value(
    current: f64,
    kind: TriggerKind,
    rate: f64,
    target: f64,
    speed: f64,
) -> Option<f64> {
    let gap = target - rate;
    if gap.abs() <= RATE_DEADBAND {
        return None;
    }

    let floor = if kind == TriggerKind::ContextUsage {
        FRACTION_STEP_FLOOR
    } else {
        COUNT_STEP_FLOOR
    };
    let step = (gap.abs() * speed * current).max(floor);
    let (lo, hi) = bounds(kind);
    let mut next = if gap > 0.0 {
        current + step
    } else {
        current - step
    }
    .clamp(lo, hi);
    if kind != TriggerKind::ContextUsage {
        next = next.round();
    }

    if (next - current).abs() < f64::EPSILON {
        None
    } else {
        Some(next)
    }
}

fn insights_from(log: &RejectionLog) -> LearningInsights {
    let mut reasons: BTreeMap<String, usize> = BTreeMap::new();
    let mut categories: BTreeMap<String, usize> = BTreeMap::new();
    for record in &log.records {
        let reason = record
            .reason
            .clone()
            .unwrap_or_else(|| "unspecified".to_string());
        *reasons.entry(reason).or_default() += 1;
        *categories.entry(record.category.clone()).or_default() += 1;
    }

    let total = log.len();
    let mut anti_patterns = Vec::new();
    for (category, &count) in &categories {
        if count < ANTI_PATTERN_MIN_REJECTIONS || total == 0 {
            continue;
        }
        let share = count as f64 / total as f64;
        if share >= ANTI_PATTERN_MIN_SHARE {
            anti_patterns.push(AntiPattern {
                category: category.clone(),
                count,
                share,
            });
        }
    }

    LearningInsights {
        reason_counts: sorted_desc(reasons),
        category_counts: sorted_desc(categories),
        anti_patterns,
    }
}

fn sorted_desc(counts: BTreeMap<String, usize>) -> Vec<(String, usize)> {
    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::stats::CategoryStats;

    async fn engine_in(dir: &std::path::Path) -> LearningEngine {
        let state = StateDir::at(dir);
        state.ensure().await.unwrap();
        LearningEngine::new(state, LearningConfig::default(), TriggerConfig::default())
    }

    #[test]
    fn test_rate_inside_deadband_proposes_nothing() {
        assert_eq!(
            proposed_value(50.0, TriggerKind::LinesWritten, 0.75, 0.75, 0.1),
            None
        );
        assert_eq!(
            proposed_value(50.0, TriggerKind::LinesWritten, 0.66, 0.75, 0.1),
            None
        );
        assert_eq!(
            proposed_value(50.0, TriggerKind::LinesWritten, 0.84, 0.75, 0.1),
            None
        );
    }

    #[test]
    fn test_low_rate_raises_threshold() {
        let proposed = proposed_value(50.0, TriggerKind::LinesWritten, 0.30, 0.75, 0.1);
        assert_eq!(proposed, Some(52.0));
    }

    #[test]
    fn test_high_rate_lowers_threshold() {
        let proposed = proposed_value(50.0, TriggerKind::LinesWritten, 0.95, 0.75, 0.1);
        assert_eq!(proposed, Some(49.0));
    }

    #[test]
    fn test_threshold_never_leaves_bounds() {
        assert_eq!(
            proposed_value(10.0, TriggerKind::RepeatedError, 0.30, 0.75, 0.1),
            None
        );
        assert_eq!(
            proposed_value(2.0, TriggerKind::RepeatedError, 0.95, 0.75, 0.1),
            None
        );
        assert_eq!(
            proposed_value(9.0, TriggerKind::RepeatedError, 0.30, 0.75, 0.1),
            Some(10.0)
        );
    }

    #[test]
    fn test_context_threshold_moves_fractionally() {
        let proposed = proposed_value(0.7, TriggerKind::ContextUsage, 0.30, 0.75, 0.1)
            .expect("outside deadband");
        assert!(proposed > 0.7);
        assert!(proposed < 0.75);
        assert_eq!(
            proposed_value(0.95, TriggerKind::ContextUsage, 0.30, 0.75, 0.1),
            None
        );
    }

    #[tokio::test]
    async fn test_record_updates_stats_and_rejection_log() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine_in(tmp.path()).await;

        engine
            .record(&ReviewDecision::accept("security", "Check token expiry"))
            .await
            .unwrap();
        engine
            .record(&ReviewDecision::reject(
                "security",
                "Rename everything",
                Some("too invasive".to_string()),
            ))
            .await
            .unwrap();

        let stats = engine.stats().await;
        let cat = &stats.by_category["security"];
        assert_eq!(cat.accepted, 1);
        assert_eq!(cat.rejected, 1);

        let log = engine.rejections().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log.records[0].reason.as_deref(), Some("too invasive"));
    }

    #[tokio::test]
    async fn test_ten_rejects_raise_associated_threshold() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine_in(tmp.path()).await;

        let mut previous_rate = 0.5;
        let mut previous_lines = engine.effective_thresholds().await.lines_threshold;
        for i in 0..10 {
            engine
                .record(&ReviewDecision::reject(
                    "security",
                    &format!("suggestion {i}"),
                    None,
                ))
                .await
                .unwrap();

            let rate = engine.stats().await.rate_for("security").unwrap();
            assert!(rate < previous_rate);
            previous_rate = rate;

            let lines = engine.effective_thresholds().await.lines_threshold;
            assert!(lines > previous_lines);
            previous_lines = lines;
        }
        assert!(previous_lines <= 500);
    }

    #[tokio::test]
    async fn test_recommend_raises_and_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine_in(tmp.path()).await;

        let mut stats = AcceptanceStats::default();
        stats.by_category.insert(
            "security".to_string(),
            CategoryStats {
                accepted: 3,
                rejected: 7,
                rate: 0.30,
            },
        );
        JsonStore::new(engine.state.acceptance_file())
            .save(&stats)
            .await
            .unwrap();

        let deltas = engine.recommend().await;
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].kind, TriggerKind::LinesWritten);
        assert!(deltas[0].is_raise());
        assert!(!engine.state.tuning_file().exists());
    }

    #[tokio::test]
    async fn test_adjust_applies_recommendations() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine_in(tmp.path()).await;

        let mut stats = AcceptanceStats::default();
        stats.by_category.insert(
            "error_analysis".to_string(),
            CategoryStats {
                accepted: 1,
                rejected: 9,
                rate: 0.20,
            },
        );
        JsonStore::new(engine.state.acceptance_file())
            .save(&stats)
            .await
            .unwrap();

        let deltas = engine.adjust().await.unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].kind, TriggerKind::RepeatedError);

        let thresholds = engine.effective_thresholds().await;
        assert_eq!(thresholds.error_repeat_threshold, 4);
        // The lines threshold stayed at the baseline.
        assert_eq!(thresholds.lines_threshold, 50);
    }

    #[tokio::test]
    async fn test_insights_flag_anti_patterns() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine_in(tmp.path()).await;

        let mut log = RejectionLog::default();
        for i in 0..9 {
            log.push(RejectionRecord::new(
                "style",
                &format!("nit {i}"),
                Some("too pedantic".to_string()),
            ));
        }
        log.push(RejectionRecord::new("security", "one off", None));
        JsonStore::new(engine.state.rejections_file())
            .save(&log)
            .await
            .unwrap();

        let insights = engine.insights().await;
        assert_eq!(insights.category_counts[0], ("style".to_string(), 9));
        assert_eq!(insights.reason_counts[0], ("too pedantic".to_string(), 9));
        assert_eq!(insights.anti_patterns.len(), 1);
        assert_eq!(insights.anti_patterns[0].category, "style");
        assert!(insights.anti_patterns[0].share >= 0.8);
    }

    #[tokio::test]
    async fn test_no_anti_pattern_below_minimum_count() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine_in(tmp.path()).await;

        let mut log = RejectionLog::default();
        for i in 0..4 {
            log.push(RejectionRecord::new("style", &format!("nit {i}"), None));
        }
        JsonStore::new(engine.state.rejections_file())
            .save(&log)
            .await
            .unwrap();

        let insights = engine.insights().await;
        assert!(insights.anti_patterns.is_empty());
    }
}
