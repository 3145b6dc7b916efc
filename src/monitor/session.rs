//! Session monitor over the persisted counters record.

use chrono::Utc;

use crate::config::SentinelConfig;
use crate::storage::{FileLock, JsonStore, StateDir, StorageError};

use super::{
    compute_health, evaluate_triggers, HealthReport, SessionCounters, SessionEvent, SessionPhase,
    Trigger, TriggerKind,
};

/// Watches session activity and decides when a review is due.
///
/// All state lives in one JSON record; every mutation runs under the
/// record's advisory lock so two processes feeding events never
/// double-count or clobber each other.
#[derive(Debug, Clone)]
pub struct SessionMonitor {
    record: JsonStore<SessionCounters>,
    config: SentinelConfig,
}

impl SessionMonitor {
    #[must_use]
    pub fn new(state: &StateDir, config: SentinelConfig) -> Self {
        Self {
            record: JsonStore::new(state.session_file()),
            config,
        }
    }

    /// Fold one event into the counters.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the record is locked by another
    /// process or cannot be written; the event is not recorded then and
    /// the caller decides whether that is worth surfacing.
    pub async fn record_event(&self, event: &SessionEvent) -> Result<(), StorageError> {
        let _lock = FileLock::acquire(self.record.lock_path()).await?;
        let mut counters = self.record.load().await;
        counters.record(event, &self.config.review, Utc::now());
        self.record.save(&counters).await
    }

    /// Evaluate triggers against the current counters. Read-only.
    pub async fn check_triggers(&self) -> Vec<Trigger> {
        let counters = self.record.load().await;
        evaluate_triggers(&counters, &self.config.triggers, Utc::now())
    }

    /// Composite health of the session. Read-only.
    pub async fn compute_health(&self) -> HealthReport {
        let counters = self.record.load().await;
        compute_health(
            &counters,
            &self.config.triggers,
            &self.config.health,
            Utc::now(),
        )
    }

    /// Current counters, for display.
    pub async fn counters(&self) -> SessionCounters {
        self.record.load().await
    }

    /// Zero only the counters backing the given trigger kinds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on lock contention or write failure; the
    /// counters are left as they were.
    pub async fn reset(&self, kinds: &[TriggerKind]) -> Result<(), StorageError> {
        let _lock = FileLock::acquire(self.record.lock_path()).await?;
        let mut counters = self.record.load().await;
        for kind in kinds {
            match kind {
                TriggerKind::LinesWritten => {
                    counters.lines_written = 0;
                    counters.lines_by_file.clear();
                    counters.high_stakes = false;
                }
                TriggerKind::RepeatedError => counters.errors.clear(),
                TriggerKind::FileChurn => counters.edits.clear(),
                TriggerKind::RepeatedCorrections => counters.corrections.clear(),
                TriggerKind::ContextUsage => counters.context_usage = 0.0,
            }
        }
        tracing::debug!(kinds = ?kinds, "Reset trigger counters");
        self.record.save(&counters).await
    }

    /// Mark the review cycle as started.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on lock contention or write failure.
    pub async fn begin_review(&self) -> Result<(), StorageError> {
        let _lock = FileLock::acquire(self.record.lock_path()).await?;
        let mut counters = self.record.load().await;
        counters.set_phase(SessionPhase::Triggered);
        counters.set_phase(SessionPhase::Reviewing);
        self.record.save(&counters).await
    }

    /// Mark the review cycle as finished.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on lock contention or write failure.
    pub async fn finish_review(&self) -> Result<(), StorageError> {
        let _lock = FileLock::acquire(self.record.lock_path()).await?;
        let mut counters = self.record.load().await;
        counters.set_phase(SessionPhase::Cooldown);
        self.record.save(&counters).await
    }

    /// Replace the record with a fresh idle session, returning the old
    /// counters for the handoff summary.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on lock contention or write failure.
    pub async fn reset_all(&self) -> Result<SessionCounters, StorageError> {
        let _lock = FileLock::acquire(self.record.lock_path()).await?;
        let old = self.record.load().await;
        self.record.save(&SessionCounters::default()).await?;
        tracing::info!("Session counters reset");
        Ok(old)
    }
}
