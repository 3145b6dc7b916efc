//! Session health scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{HealthWeights, TriggerConfig};

use super::{SessionCounters, TriggerKind};

/// Score below which a handoff is recommended.
pub const HANDOFF_THRESHOLD: u8 = 40;

/// Normalized pressure on one trigger signal, `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPressure {
    pub kind: TriggerKind,
    pub value: f64,
}

/// Composite view of how strained the session is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `0..=100`, higher is healthier.
    pub score: u8,
    pub pressures: Vec<SignalPressure>,
    pub recommendations: Vec<String>,
    pub needs_handoff: bool,
}

/// Weighted composite over the five trigger signals.
///
/// An empty session scores 100. Each signal contributes its pressure
/// (count over threshold, capped at 1.0) scaled by its weight.
#[must_use]
pub fn compute_health(
    counters: &SessionCounters,
    triggers: &TriggerConfig,
    weights: &HealthWeights,
    now: DateTime<Utc>,
) -> HealthReport {
    let lines = pressure(counters.lines_written, triggers.lines_threshold);
    let errors = pressure(counters.max_error_repeats(now).0, triggers.error_repeat_threshold);
    let churn = pressure(counters.max_file_churn(now).0, triggers.file_churn_threshold);
    let corrections = pressure(counters.recent_corrections(now), triggers.correction_threshold);
    let context = if triggers.context_warning_percent > 0.0 {
        (counters.context_usage / triggers.context_warning_percent).min(1.0)
    } else {
        0.0
    };

    let pressures = vec![
        SignalPressure {
            kind: TriggerKind::LinesWritten,
            value: lines,
        },
        SignalPressure {
            kind: TriggerKind::RepeatedError,
            value: errors,
        },
        SignalPressure {
            kind: TriggerKind::FileChurn,
            value: churn,
        },
        SignalPressure {
            kind: TriggerKind::RepeatedCorrections,
            value: corrections,
        },
        SignalPressure {
            kind: TriggerKind::ContextUsage,
            value: context,
        },
    ];

    let strain = weights.lines * lines
        + weights.errors * errors
        + weights.churn * churn
        + weights.corrections * corrections
        + weights.context * context;
    let score = ((1.0 - strain) * 100.0).round().clamp(0.0, 100.0) as u8;

    let mut recommendations: Vec<String> = pressures
        .iter()
        .filter(|p| p.value >= 1.0)
        .map(|p| recommendation_for(p.kind, counters, now))
        .collect();
    let needs_handoff = score < HANDOFF_THRESHOLD;
    if needs_handoff {
        recommendations.push("Session health is low, export a handoff summary".to_string());
    }

    HealthReport {
        score,
        pressures,
        recommendations,
        needs_handoff,
    }
}

fn pressure(count: u32, threshold: u32) -> f64 {
    if threshold == 0 {
        return 0.0;
    }
    (f64::from(count) / f64::from(threshold)).min(1.0)
}

fn recommendation_for(kind: TriggerKind, counters: &SessionCounters, now: DateTime<Utc>) -> String {
    match kind {
        TriggerKind::LinesWritten => {
            "Large volume of unreviewed code, run a review".to_string()
        }
        TriggerKind::RepeatedError => {
            let (_, signature) = counters.max_error_repeats(now);
            format!(
                "Same error keeps recurring ({}), switch to a debug review",
                signature.unwrap_or("<unknown>")
            )
        }
        TriggerKind::FileChurn => {
            let (_, file) = counters.max_file_churn(now);
            format!(
                "{} is churning, step back and review the approach",
                file.unwrap_or("<unknown>")
            )
        }
        TriggerKind::RepeatedCorrections => {
            "Several corrections recently, re-check the task requirements".to_string()
        }
        TriggerKind::ContextUsage => {
            "Context window is filling up, consider wrapping up or handing off".to_string()
        }
    }
}
