//! Persisted session counters.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ReviewRules;

use super::{error_signature, SessionEvent, SessionPhase};

/// Rolling window for file-churn detection.
pub const CHURN_WINDOW_MINUTES: i64 = 10;

/// Rolling window for repeated errors and corrections.
pub const REPEAT_WINDOW_MINUTES: i64 = 30;

/// Counter state accumulated over a session.
///
/// Timestamped counters are pruned lazily whenever the record is touched;
/// nothing here ever grows past the rolling windows plus the per-session
/// line totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCounters {
    #[serde(default = "Utc::now")]
    pub started: DateTime<Utc>,
    #[serde(default)]
    pub phase: SessionPhase,
    /// Lines written since the lines counter was last reset.
    #[serde(default)]
    pub lines_written: u32,
    #[serde(default)]
    pub lines_by_file: BTreeMap<String, u32>,
    /// Error signature to occurrence times.
    #[serde(default)]
    pub errors: BTreeMap<String, Vec<DateTime<Utc>>>,
    /// File path to edit times.
    #[serde(default)]
    pub edits: BTreeMap<String, Vec<DateTime<Utc>>>,
    #[serde(default)]
    pub corrections: Vec<DateTime<Utc>>,
    /// Context-window usage, `0.0..=1.0`.
    #[serde(default)]
    pub context_usage: f64,
    /// An `always_review` path was written since the last lines reset.
    #[serde(default)]
    pub high_stakes: bool,
}

impl Default for SessionCounters {
    fn default() -> Self {
        Self {
            started: Utc::now(),
            phase: SessionPhase::Idle,
            lines_written: 0,
            lines_by_file: BTreeMap::new(),
            errors: BTreeMap::new(),
            edits: BTreeMap::new(),
            corrections: Vec::new(),
            context_usage: 0.0,
            high_stakes: false,
        }
    }
}

impl SessionCounters {
    /// Fold one event into the counters.
    pub fn record(&mut self, event: &SessionEvent, rules: &ReviewRules, now: DateTime<Utc>) {
        match event {
            SessionEvent::CodeWritten { file, lines } => {
                if rules.is_exempt(file) {
                    tracing::debug!(file = %file, "Exempt path, no review pressure");
                } else {
                    self.lines_written = self.lines_written.saturating_add(*lines);
                    *self.lines_by_file.entry(file.clone()).or_insert(0) += lines;
                    if rules.is_high_stakes(file) {
                        self.high_stakes = true;
                    }
                }
            }
            SessionEvent::ErrorSeen { message } => {
                let signature = error_signature(message);
                if !signature.is_empty() {
                    self.errors.entry(signature).or_default().push(now);
                }
            }
            SessionEvent::FileEdited { file } => {
                self.edits.entry(file.clone()).or_default().push(now);
            }
            SessionEvent::Correction => {
                self.corrections.push(now);
            }
            SessionEvent::ContextUsage { fraction } => {
                self.context_usage = fraction.clamp(0.0, 1.0);
            }
        }

        if matches!(self.phase, SessionPhase::Idle | SessionPhase::Cooldown) {
            self.set_phase(SessionPhase::Accumulating);
        }
        self.prune(now);
    }

    /// Drop timestamps that have aged out of their windows.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let error_cutoff = now - Duration::minutes(REPEAT_WINDOW_MINUTES);
        let churn_cutoff = now - Duration::minutes(CHURN_WINDOW_MINUTES);

        for times in self.errors.values_mut() {
            times.retain(|t| *t > error_cutoff);
        }
        self.errors.retain(|_, times| !times.is_empty());

        for times in self.edits.values_mut() {
            times.retain(|t| *t > churn_cutoff);
        }
        self.edits.retain(|_, times| !times.is_empty());

        self.corrections.retain(|t| *t > error_cutoff);
    }

    /// Log and apply a phase transition.
    pub fn set_phase(&mut self, to: SessionPhase) {
        tracing::debug!(from = ?self.phase, to = ?to, "Phase transition");
        self.phase = to;
    }

    /// Occurrences of the most-repeated error signature in the window.
    #[must_use]
    pub fn max_error_repeats(&self, now: DateTime<Utc>) -> (u32, Option<&str>) {
        let cutoff = now - Duration::minutes(REPEAT_WINDOW_MINUTES);
        self.errors
            .iter()
            .map(|(sig, times)| {
                let count = times.iter().filter(|t| **t > cutoff).count() as u32;
                (count, sig.as_str())
            })
            .max_by_key(|(count, _)| *count)
            .map_or((0, None), |(count, sig)| (count, Some(sig)))
    }

    /// Edits to the most-churned file in the window.
    #[must_use]
    pub fn max_file_churn(&self, now: DateTime<Utc>) -> (u32, Option<&str>) {
        let cutoff = now - Duration::minutes(CHURN_WINDOW_MINUTES);
        self.edits
            .iter()
            .map(|(file, times)| {
                let count = times.iter().filter(|t| **t > cutoff).count() as u32;
                (count, file.as_str())
            })
            .max_by_key(|(count, _)| *count)
            .map_or((0, None), |(count, file)| (count, Some(file)))
    }

    /// Corrections inside the window.
    #[must_use]
    pub fn recent_corrections(&self, now: DateTime<Utc>) -> u32 {
        let cutoff = now - Duration::minutes(REPEAT_WINDOW_MINUTES);
        self.corrections.iter().filter(|t| **t > cutoff).count() as u32
    }
}
