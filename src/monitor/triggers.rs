//! Review trigger evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TriggerConfig;

use super::SessionCounters;

/// The counter a trigger watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    LinesWritten,
    RepeatedError,
    FileChurn,
    RepeatedCorrections,
    ContextUsage,
}

impl TriggerKind {
    /// All kinds in evaluation order.
    pub const ALL: [TriggerKind; 5] = [
        TriggerKind::LinesWritten,
        TriggerKind::RepeatedError,
        TriggerKind::FileChurn,
        TriggerKind::RepeatedCorrections,
        TriggerKind::ContextUsage,
    ];

    /// Trigger kind a suggestion category steers during learning.
    #[must_use]
    pub fn for_category(category: &str) -> Self {
        match category.trim().to_lowercase().as_str() {
            "debug" | "error" | "errors" | "error_analysis" => TriggerKind::RepeatedError,
            "churn" | "refactor" | "refactoring" => TriggerKind::FileChurn,
            "correction" | "corrections" => TriggerKind::RepeatedCorrections,
            "context" => TriggerKind::ContextUsage,
            _ => TriggerKind::LinesWritten,
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TriggerKind::LinesWritten => "lines_written",
            TriggerKind::RepeatedError => "repeated_error",
            TriggerKind::FileChurn => "file_churn",
            TriggerKind::RepeatedCorrections => "repeated_corrections",
            TriggerKind::ContextUsage => "context_usage",
        };
        write!(f, "{name}")
    }
}

/// Urgency of a fired trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerPriority {
    High,
    Medium,
}

impl std::fmt::Display for TriggerPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerPriority::High => write!(f, "high"),
            TriggerPriority::Medium => write!(f, "medium"),
        }
    }
}

/// One fired trigger with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub priority: TriggerPriority,
    pub detail: String,
}

/// Evaluate every trigger against the current counters.
///
/// Pure with respect to the counters: calling this twice without an
/// intervening event yields the same set.
#[must_use]
pub fn evaluate_triggers(
    counters: &SessionCounters,
    config: &TriggerConfig,
    now: DateTime<Utc>,
) -> Vec<Trigger> {
    let mut fired = Vec::new();

    if counters.lines_written >= config.lines_threshold {
        let priority = if counters.high_stakes {
            TriggerPriority::High
        } else {
            TriggerPriority::Medium
        };
        fired.push(Trigger {
            kind: TriggerKind::LinesWritten,
            priority,
            detail: format!(
                "{} lines written since last review (threshold {})",
                counters.lines_written, config.lines_threshold
            ),
        });
    }

    let (repeats, signature) = counters.max_error_repeats(now);
    if repeats >= config.error_repeat_threshold {
        fired.push(Trigger {
            kind: TriggerKind::RepeatedError,
            priority: TriggerPriority::High,
            detail: format!(
                "error repeated {repeats}x: {}",
                signature.unwrap_or("<unknown>")
            ),
        });
    }

    let (churn, file) = counters.max_file_churn(now);
    if churn >= config.file_churn_threshold {
        fired.push(Trigger {
            kind: TriggerKind::FileChurn,
            priority: TriggerPriority::Medium,
            detail: format!(
                "{} edited {churn}x in {} min",
                file.unwrap_or("<unknown>"),
                super::CHURN_WINDOW_MINUTES
            ),
        });
    }

    let corrections = counters.recent_corrections(now);
    if corrections >= config.correction_threshold {
        fired.push(Trigger {
            kind: TriggerKind::RepeatedCorrections,
            priority: TriggerPriority::High,
            detail: format!(
                "{corrections} corrections in {} min",
                super::REPEAT_WINDOW_MINUTES
            ),
        });
    }

    if counters.context_usage >= config.context_warning_percent {
        fired.push(Trigger {
            kind: TriggerKind::ContextUsage,
            priority: TriggerPriority::High,
            detail: format!(
                "context usage at {:.0}% (warning at {:.0}%)",
                counters.context_usage * 100.0,
                config.context_warning_percent * 100.0
            ),
        });
    }

    fired
}
