//! Review cycle runner connecting the session monitor, context
//! extractor, analysis worker, and suggestion validator.
//!
//! One cycle is linear: check triggers, gather context, ask the worker,
//! validate what came back. A worker failure degrades the cycle to zero
//! suggestions; it never aborts the session.

use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;

use crate::config::{ConfigError, SentinelConfig};
use crate::context::{ContextExtractor, TaskSpec, TaskTemplate};
use crate::knowledge::{Category, KnowledgeEntry, KnowledgeStore, Priority};
use crate::learning::{LearningEngine, ReviewDecision};
use crate::monitor::{HealthReport, SessionEvent, SessionMonitor, Trigger, TriggerKind};
use crate::storage::{StateDir, StorageError};
use crate::validate::{SuggestionValidator, ValidatedSuggestion};
use crate::worker::SuggestionSource;

/// Knowledge entries carried into a handoff note, per section.
const HANDOFF_SECTION_LIMIT: usize = 5;

/// Characters of entry content quoted in a handoff note.
const HANDOFF_CONTENT_CLIP: usize = 100;

/// Error type for review cycle operations.
#[derive(Error, Debug)]
pub enum CycleError {
    /// A task template could not be loaded or parsed.
    #[error("Template error: {0}")]
    Template(#[from] ConfigError),
    /// Session or learning state could not be read or written.
    #[error("State error: {0}")]
    State(#[from] StorageError),
}

/// Outcome of one review cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Triggers that fired when the cycle started. Empty means no
    /// review was needed and nothing else ran.
    pub triggers: Vec<Trigger>,
    /// Surviving suggestions, ordered by descending confidence.
    pub suggestions: Vec<ValidatedSuggestion>,
    /// Characters in the bundle sent to the worker.
    pub bundle_chars: usize,
    /// The bundle hit its size cap and dropped content.
    pub bundle_truncated: bool,
    /// The worker failed; the cycle finished without suggestions.
    pub worker_degraded: bool,
}

impl CycleReport {
    /// Whether any trigger fired this cycle.
    #[must_use]
    pub fn review_ran(&self) -> bool {
        !self.triggers.is_empty()
    }

    fn idle() -> Self {
        Self {
            triggers: Vec::new(),
            suggestions: Vec::new(),
            bundle_chars: 0,
            bundle_truncated: false,
            worker_degraded: false,
        }
    }
}

/// Orchestrates review cycles over one session's state directory.
///
/// Construction loads learned trigger thresholds, so every subsystem
/// below sees the adapted values rather than the configured baseline.
pub struct Sentinel {
    state: StateDir,
    config: SentinelConfig,
    monitor: SessionMonitor,
    extractor: ContextExtractor,
    store: KnowledgeStore,
    learning: LearningEngine,
    validator: SuggestionValidator,
    worker: Box<dyn SuggestionSource>,
}

impl Sentinel {
    /// Create a sentinel over a state directory with the given worker.
    pub async fn new(
        state: StateDir,
        config: SentinelConfig,
        worker: Box<dyn SuggestionSource>,
    ) -> Self {
        let learning = LearningEngine::new(
            state.clone(),
            config.learning.clone(),
            config.triggers.clone(),
        );

        let mut effective = config;
        effective.triggers = learning.effective_thresholds().await;

        let monitor = SessionMonitor::new(&state, effective.clone());
        let extractor = ContextExtractor::new(state.clone(), effective.clone());
        let store = KnowledgeStore::new(state.clone(), effective.knowledge.clone());

        Self {
            state,
            config: effective,
            monitor,
            extractor,
            store,
            learning,
            validator: SuggestionValidator::new(),
            worker,
        }
    }

    /// The session monitor, for recording events and reading health.
    #[must_use]
    pub fn monitor(&self) -> &SessionMonitor {
        &self.monitor
    }

    /// The knowledge store backing context extraction.
    #[must_use]
    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// The learning engine, for stats and threshold tuning.
    #[must_use]
    pub fn learning(&self) -> &LearningEngine {
        &self.learning
    }

    /// The effective configuration, learned thresholds included.
    #[must_use]
    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    /// Run one review cycle for the given task.
    ///
    /// Checks triggers first; when none fire, returns an idle report
    /// without touching anything else. Otherwise gathers context,
    /// renders the task template, runs the worker, and validates its
    /// suggestions. Counters are not reset here; that happens when
    /// decisions are applied.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::Template` when the task template cannot be
    /// loaded and `CycleError::State` when session state cannot be
    /// persisted. Worker failures do not error; they degrade the
    /// report.
    pub async fn run_cycle(&self, task: &TaskSpec) -> Result<CycleReport, CycleError> {
        let triggers = self.monitor.check_triggers().await;
        if triggers.is_empty() {
            tracing::debug!("No triggers firing, review not needed");
            return Ok(CycleReport::idle());
        }

        tracing::info!(
            triggers = triggers.len(),
            first = %triggers[0].detail,
            "Review triggered"
        );
        self.monitor.begin_review().await?;

        let bundle = self.extractor.build(task).await;
        let template = TaskTemplate::load(&self.state.templates_dir(), task.kind).await?;
        let prompt = template.render(&bundle.text);

        let (raw, worker_degraded) = match self.worker.run(&prompt).await {
            Ok(raw) => (raw, false),
            Err(e) => {
                tracing::warn!(error = %e, "Analysis worker failed, continuing without suggestions");
                let event = SessionEvent::ErrorSeen {
                    message: format!("analysis worker: {e}"),
                };
                if let Err(storage) = self.monitor.record_event(&event).await {
                    tracing::warn!(error = %storage, "Could not record worker failure");
                }
                (Vec::new(), true)
            }
        };

        let rules = template.rules.effective(&self.config.validation);
        let knowledge = self.store.high_priority_entries().await;
        let rejections = self.learning.rejections().await;
        let stats = self.learning.stats().await;
        let suggestions = self
            .validator
            .validate(raw, &knowledge, &rejections, &stats, &rules);

        tracing::info!(
            suggestions = suggestions.len(),
            bundle_chars = bundle.char_count(),
            degraded = worker_degraded,
            "Review cycle finished"
        );

        Ok(CycleReport {
            triggers,
            suggestions,
            bundle_chars: bundle.char_count(),
            bundle_truncated: bundle.truncated,
            worker_degraded,
        })
    }

    /// Apply accept/reject decisions from a finished cycle.
    ///
    /// Records each decision with the learning engine, resets the
    /// counters behind the triggers that fired, and moves the session
    /// into cooldown.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::State` when learning or session state
    /// cannot be persisted.
    pub async fn apply_decisions(
        &self,
        report: &CycleReport,
        decisions: &[ReviewDecision],
    ) -> Result<(), CycleError> {
        for decision in decisions {
            self.learning.record(decision).await?;
        }

        let kinds: Vec<TriggerKind> = report.triggers.iter().map(|t| t.kind).collect();
        self.monitor.reset(&kinds).await?;
        self.monitor.finish_review().await?;

        tracing::info!(decisions = decisions.len(), "Review cycle closed");
        Ok(())
    }

    /// Current session health.
    pub async fn health(&self) -> HealthReport {
        self.monitor.compute_health().await
    }

    /// Write a handoff note and start a fresh session.
    ///
    /// The note carries the health picture plus the knowledge a
    /// successor session needs first: critical patterns, recent
    /// corrections, and active gotchas. All counters are reset after
    /// the note is written.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::State` when the note cannot be written or
    /// the counters cannot be reset.
    pub async fn write_handoff(&self) -> Result<PathBuf, CycleError> {
        let health = self.monitor.compute_health().await;
        let counters = self.monitor.counters().await;

        let patterns = section_entries(&self.store, Category::Pattern, Priority::Critical).await;
        let corrections = recent_corrections(&self.store).await;
        let gotchas = section_entries(&self.store, Category::Gotcha, Priority::High).await;

        let note = render_handoff(&health, &counters, &patterns, &corrections, &gotchas);

        let path = self.state.handoff_file();
        tokio::fs::write(&path, &note)
            .await
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;

        let old = self.monitor.reset_all().await?;
        tracing::info!(
            path = %path.display(),
            score = health.score,
            lines = old.lines_written,
            "Session handed off"
        );
        Ok(path)
    }
}

/// Entries of one category at or above a priority, most urgent first.
async fn section_entries(
    store: &KnowledgeStore,
    category: Category,
    cutoff: Priority,
) -> Vec<KnowledgeEntry> {
    let mut entries: Vec<KnowledgeEntry> = store
        .entries(category)
        .await
        .into_iter()
        .filter(|e| e.priority <= cutoff)
        .collect();
    entries.sort_by_key(|e| e.priority);
    entries.truncate(HANDOFF_SECTION_LIMIT);
    entries
}

/// Latest corrections regardless of priority, newest first.
async fn recent_corrections(store: &KnowledgeStore) -> Vec<KnowledgeEntry> {
    let mut entries = store.entries(Category::Correction).await;
    entries.sort_by(|a, b| b.created.cmp(&a.created));
    entries.truncate(HANDOFF_SECTION_LIMIT);
    entries
}

fn render_handoff(
    health: &HealthReport,
    counters: &crate::monitor::SessionCounters,
    patterns: &[KnowledgeEntry],
    corrections: &[KnowledgeEntry],
    gotchas: &[KnowledgeEntry],
) -> String {
    let mut note = String::new();
    note.push_str("# Session Handoff\n\n");
    note.push_str(&format!("Generated: {}\n", Utc::now().to_rfc3339()));
    note.push_str(&format!("Health: {}/100\n", health.score));

    let reason = health
        .recommendations
        .first()
        .map_or("session wind-down requested", String::as_str);
    note.push_str(&format!("Reason: {reason}\n\n"));

    note.push_str("## Session\n\n");
    note.push_str(&format!("- Started: {}\n", counters.started.to_rfc3339()));
    note.push_str(&format!("- Lines written: {}\n", counters.lines_written));
    note.push_str(&format!("- Corrections: {}\n", counters.corrections.len()));
    note.push_str(&format!("- Distinct errors: {}\n", counters.errors.len()));
    note.push_str(&format!(
        "- Context usage: {:.0}%\n\n",
        counters.context_usage * 100.0
    ));

    push_entry_section(&mut note, "## Critical Patterns\n\n", patterns);
    if !corrections.is_empty() {
        note.push_str("## Recent Corrections\n\nDo not repeat these mistakes:\n\n");
        for entry in corrections {
            push_entry_line(&mut note, entry);
        }
        note.push('\n');
    }
    push_entry_section(&mut note, "## Active Gotchas\n\n", gotchas);

    note
}

fn push_entry_section(note: &mut String, header: &str, entries: &[KnowledgeEntry]) {
    if entries.is_empty() {
        return;
    }
    note.push_str(header);
    for entry in entries {
        push_entry_line(note, entry);
    }
    note.push('\n');
}

fn push_entry_line(note: &mut String, entry: &KnowledgeEntry) {
    let content: String = entry.content.chars().take(HANDOFF_CONTENT_CLIP).collect();
    note.push_str(&format!("- **{}**: {content}\n", entry.title));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SentinelConfig;
    use crate::knowledge::KnowledgeEntry;
    use crate::learning::AcceptanceStats;
    use crate::storage::JsonStore;
    use crate::worker::{RawSuggestion, WorkerError};
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct FixedSource {
        suggestions: Vec<RawSuggestion>,
    }

    #[async_trait]
    impl SuggestionSource for FixedSource {
        async fn run(&self, _bundle: &str) -> Result<Vec<RawSuggestion>, WorkerError> {
            Ok(self.suggestions.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl SuggestionSource for FailingSource {
        async fn run(&self, _bundle: &str) -> Result<Vec<RawSuggestion>, WorkerError> {
            Err(WorkerError::Timeout(30))
        }
    }

    fn raw(text: &str, category: &str) -> RawSuggestion {
        RawSuggestion {
            text: text.to_string(),
            category: category.to_string(),
            file: None,
            line: None,
        }
    }

    async fn sentinel_with(
        root: &std::path::Path,
        worker: Box<dyn SuggestionSource>,
    ) -> Sentinel {
        let state = StateDir::at(root);
        state.ensure().await.unwrap();
        Sentinel::new(state, SentinelConfig::default(), worker).await
    }

    async fn write_lines(sentinel: &Sentinel, lines: u32) {
        sentinel
            .monitor()
            .record_event(&SessionEvent::CodeWritten {
                file: "src/main.rs".to_string(),
                lines,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_idle_report_when_nothing_fired() {
        let dir = tempdir().unwrap();
        let sentinel = sentinel_with(dir.path(), Box::new(FixedSource { suggestions: vec![] })).await;

        let report = sentinel
            .run_cycle(&TaskSpec::new(crate::context::TaskKind::Review))
            .await
            .unwrap();

        assert!(!report.review_ran());
        assert!(report.suggestions.is_empty());
        assert_eq!(report.bundle_chars, 0);
    }

    #[tokio::test]
    async fn test_cycle_runs_after_lines_trigger() {
        let dir = tempdir().unwrap();
        let worker = FixedSource {
            suggestions: vec![
                raw("Validate the request payload before parsing it", "security"),
                raw("Cache the compiled regex outside the loop", "performance"),
            ],
        };
        let sentinel = sentinel_with(dir.path(), Box::new(worker)).await;
        write_lines(&sentinel, 60).await;

        let report = sentinel
            .run_cycle(&TaskSpec::new(crate::context::TaskKind::Review))
            .await
            .unwrap();

        assert!(report.review_ran());
        assert!(!report.worker_degraded);
        assert_eq!(report.suggestions.len(), 2);
        assert!(report.bundle_chars > 0);
    }

    #[tokio::test]
    async fn test_worker_failure_degrades_cycle() {
        let dir = tempdir().unwrap();
        let sentinel = sentinel_with(dir.path(), Box::new(FailingSource)).await;
        write_lines(&sentinel, 60).await;

        let report = sentinel
            .run_cycle(&TaskSpec::new(crate::context::TaskKind::Review))
            .await
            .unwrap();

        assert!(report.review_ran());
        assert!(report.worker_degraded);
        assert!(report.suggestions.is_empty());

        // The failure lands in the error counter for later triggers.
        let counters = sentinel.monitor().counters().await;
        assert_eq!(counters.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_decisions_reset_fired_counters() {
        let dir = tempdir().unwrap();
        let worker = FixedSource {
            suggestions: vec![raw("Add a bounds check to the index math", "correctness")],
        };
        let sentinel = sentinel_with(dir.path(), Box::new(worker)).await;
        write_lines(&sentinel, 60).await;

        let report = sentinel
            .run_cycle(&TaskSpec::new(crate::context::TaskKind::Review))
            .await
            .unwrap();
        assert!(report.review_ran());

        let decisions =
            vec![ReviewDecision::accept("correctness", "Add a bounds check to the index math")];
        sentinel.apply_decisions(&report, &decisions).await.unwrap();

        let counters = sentinel.monitor().counters().await;
        assert_eq!(counters.lines_written, 0);

        // Accepts feed the per-category stats.
        let stats = sentinel.learning().stats().await;
        assert_eq!(stats.by_category.get("correctness").map(|s| s.accepted), Some(1));
    }

    #[tokio::test]
    async fn test_rejection_suppresses_resuggestion() {
        let dir = tempdir().unwrap();
        let text = "Swallow the parse error and return an empty list";
        let worker = FixedSource {
            suggestions: vec![raw(text, "style")],
        };
        let sentinel = sentinel_with(dir.path(), Box::new(worker)).await;
        write_lines(&sentinel, 60).await;

        let first = sentinel
            .run_cycle(&TaskSpec::new(crate::context::TaskKind::Review))
            .await
            .unwrap();
        assert_eq!(first.suggestions.len(), 1);

        let decisions = vec![ReviewDecision::reject(
            "style",
            text,
            Some("hides failures".to_string()),
        )];
        sentinel.apply_decisions(&first, &decisions).await.unwrap();

        write_lines(&sentinel, 60).await;
        let second = sentinel
            .run_cycle(&TaskSpec::new(crate::context::TaskKind::Review))
            .await
            .unwrap();

        // The lowered category rate and the near-duplicate penalty
        // both drag the identical text below the confidence floor.
        assert!(second.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_handoff_note_written_and_counters_cleared() {
        let dir = tempdir().unwrap();
        let sentinel = sentinel_with(dir.path(), Box::new(FixedSource { suggestions: vec![] })).await;
        write_lines(&sentinel, 30).await;

        sentinel
            .store()
            .add(KnowledgeEntry::new(
                Category::Gotcha,
                Priority::Critical,
                "Shared test database",
                "Integration tests hit the same database, serialize them",
            ))
            .await
            .unwrap();

        let path = sentinel.write_handoff().await.unwrap();
        let note = tokio::fs::read_to_string(&path).await.unwrap();

        assert!(note.contains("# Session Handoff"));
        assert!(note.contains("Health:"));
        assert!(note.contains("## Active Gotchas"));
        assert!(note.contains("Shared test database"));

        let counters = sentinel.monitor().counters().await;
        assert_eq!(counters.lines_written, 0);
    }

    #[tokio::test]
    async fn test_learned_thresholds_feed_the_monitor() {
        let dir = tempdir().unwrap();
        let state = StateDir::at(dir.path());
        state.ensure().await.unwrap();
        let config = SentinelConfig::default();

        // Seed a category rate past the target band so adjusting lands a
        // lowered lines threshold in the tuning overlay.
        let mut stats = AcceptanceStats::default();
        for _ in 0..12 {
            stats.observe("security", true, config.learning.learning_speed);
        }
        JsonStore::new(state.acceptance_file())
            .save(&stats)
            .await
            .unwrap();

        let learning = LearningEngine::new(
            state.clone(),
            config.learning.clone(),
            config.triggers.clone(),
        );
        let applied = learning.adjust().await.unwrap();
        assert!(!applied.is_empty());

        let sentinel = Sentinel::new(
            state,
            config.clone(),
            Box::new(FixedSource { suggestions: vec![] }),
        )
        .await;
        assert!(
            sentinel.config().triggers.lines_threshold < config.triggers.lines_threshold,
            "high acceptance should persist a more eager lines threshold"
        );
    }
}
