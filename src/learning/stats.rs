//! Acceptance tracking and rejection history records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rejection records kept on disk. Oldest entries fall off first.
pub const REJECTION_LOG_CAP: usize = 100;

/// Lowercase a text and collapse runs of whitespace to single spaces.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The reviewer's verdict on one presented suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub category: String,
    pub text: String,
    pub accepted: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ReviewDecision {
    #[must_use]
    pub fn accept(category: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            category: category.into().to_lowercase(),
            text: text.into(),
            accepted: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn reject(
        category: impl Into<String>,
        text: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            category: category.into().to_lowercase(),
            text: text.into(),
            accepted: false,
            reason,
        }
    }
}

/// One rejected suggestion, stored normalized for later similarity checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub text: String,
    pub category: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub rejected_at: DateTime<Utc>,
}

impl RejectionRecord {
    #[must_use]
    pub fn new(category: &str, text: &str, reason: Option<String>) -> Self {
        Self {
            text: normalize_text(text),
            category: category.to_lowercase(),
            reason,
            rejected_at: Utc::now(),
        }
    }
}

fn default_version() -> u32 {
    1
}

/// Append-only rejection history, capped at [`REJECTION_LOG_CAP`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionLog {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub records: Vec<RejectionRecord>,
}

impl Default for RejectionLog {
    fn default() -> Self {
        Self {
            version: default_version(),
            records: Vec::new(),
        }
    }
}

impl RejectionLog {
    /// Append a record, evicting the oldest when the cap is reached.
    pub fn push(&mut self, record: RejectionRecord) {
        self.records.push(record);
        if self.records.len() > REJECTION_LOG_CAP {
            let excess = self.records.len() - REJECTION_LOG_CAP;
            self.records.drain(..excess);
        }
    }

    /// The most recent `n` records, newest last.
    #[must_use]
    pub fn recent(&self, n: usize) -> &[RejectionRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// Records whose category matches, case-insensitive.
    #[must_use]
    pub fn same_category(&self, category: &str) -> Vec<&RejectionRecord> {
        let wanted = category.to_lowercase();
        self.records
            .iter()
            .filter(|r| r.category == wanted)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn default_rate() -> f64 {
    0.5
}

/// Accept/reject tally plus the exponential moving acceptance rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    #[serde(default)]
    pub accepted: u64,
    #[serde(default)]
    pub rejected: u64,
    #[serde(default = "default_rate")]
    pub rate: f64,
}

impl Default for CategoryStats {
    fn default() -> Self {
        Self {
            accepted: 0,
            rejected: 0,
            rate: default_rate(),
        }
    }
}

impl CategoryStats {
    /// Fold one verdict into the moving rate.
    pub fn observe(&mut self, accepted: bool, alpha: f64) {
        let outcome = if accepted {
            self.accepted += 1;
            1.0
        } else {
            self.rejected += 1;
            0.0
        };
        self.rate = (1.0 - alpha) * self.rate + alpha * outcome;
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.accepted + self.rejected
    }
}

/// Persisted acceptance statistics, per category and overall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptanceStats {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub by_category: BTreeMap<String, CategoryStats>,
    #[serde(default)]
    pub overall: CategoryStats,
}

impl Default for AcceptanceStats {
    fn default() -> Self {
        Self {
            version: default_version(),
            by_category: BTreeMap::new(),
            overall: CategoryStats::default(),
        }
    }
}

impl AcceptanceStats {
    /// Fold one verdict into the category's rate and the overall rate.
    pub fn observe(&mut self, category: &str, accepted: bool, alpha: f64) {
        self.by_category
            .entry(category.to_lowercase())
            .or_default()
            .observe(accepted, alpha);
        self.overall.observe(accepted, alpha);
    }

    /// The category's moving rate, if it has any history.
    #[must_use]
    pub fn rate_for(&self, category: &str) -> Option<f64> {
        self.by_category
            .get(&category.to_lowercase())
            .map(|s| s.rate)
    }
}
