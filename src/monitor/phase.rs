//! Session phase tracking.

use serde::{Deserialize, Serialize};

/// Where the session sits in the review lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No activity recorded yet.
    #[default]
    Idle,
    /// Activity is being counted toward triggers.
    Accumulating,
    /// At least one trigger fired; a review is due.
    Triggered,
    /// A review cycle is running.
    Reviewing,
    /// A review just finished; counters for fired triggers were reset.
    Cooldown,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Accumulating => "accumulating",
            SessionPhase::Triggered => "triggered",
            SessionPhase::Reviewing => "reviewing",
            SessionPhase::Cooldown => "cooldown",
        };
        write!(f, "{name}")
    }
}
