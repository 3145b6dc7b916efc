//! Configuration types.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Tolerance when checking that weight vectors sum to 1.0.
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Trigger thresholds for the session monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerConfig {
    /// Lines written since the last review before a review is suggested.
    #[serde(default = "default_lines_threshold")]
    pub lines_threshold: u32,
    /// Occurrences of a single error signature before a review is suggested.
    #[serde(default = "default_error_repeat_threshold")]
    pub error_repeat_threshold: u32,
    /// Edits to a single file inside the churn window before a review is suggested.
    #[serde(default = "default_file_churn_threshold")]
    pub file_churn_threshold: u32,
    /// User corrections inside the correction window before a review is suggested.
    #[serde(default = "default_correction_threshold")]
    pub correction_threshold: u32,
    /// Context-window usage fraction that warrants a warning.
    #[serde(default = "default_context_warning_percent")]
    pub context_warning_percent: f64,
}

fn default_lines_threshold() -> u32 {
    50
}

fn default_error_repeat_threshold() -> u32 {
    3
}

fn default_file_churn_threshold() -> u32 {
    5
}

fn default_correction_threshold() -> u32 {
    3
}

fn default_context_warning_percent() -> f64 {
    0.7
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            lines_threshold: default_lines_threshold(),
            error_repeat_threshold: default_error_repeat_threshold(),
            file_churn_threshold: default_file_churn_threshold(),
            correction_threshold: default_correction_threshold(),
            context_warning_percent: default_context_warning_percent(),
        }
    }
}

/// Weights for the relevance score components. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RelevanceWeights {
    #[serde(default = "default_priority_weight")]
    pub priority: f64,
    #[serde(default = "default_tag_weight")]
    pub tags: f64,
    #[serde(default = "default_keyword_weight")]
    pub keywords: f64,
    #[serde(default = "default_recency_weight")]
    pub recency: f64,
}

fn default_priority_weight() -> f64 {
    0.3
}

fn default_tag_weight() -> f64 {
    0.4
}

fn default_keyword_weight() -> f64 {
    0.2
}

fn default_recency_weight() -> f64 {
    0.1
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            priority: default_priority_weight(),
            tags: default_tag_weight(),
            keywords: default_keyword_weight(),
            recency: default_recency_weight(),
        }
    }
}

impl RelevanceWeights {
    /// Sum of all components.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.priority + self.tags + self.keywords + self.recency
    }
}

/// Knowledge store behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeConfig {
    /// Entries returned per category when building context.
    #[serde(default = "default_max_per_category")]
    pub max_per_category: usize,
    /// Hours for the recency factor to halve. Zero disables decay.
    #[serde(default = "default_half_life_hours")]
    pub half_life_hours: f64,
    #[serde(default)]
    pub relevance: RelevanceWeights,
}

fn default_max_per_category() -> usize {
    5
}

fn default_half_life_hours() -> f64 {
    720.0
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            max_per_category: default_max_per_category(),
            half_life_hours: default_half_life_hours(),
            relevance: RelevanceWeights::default(),
        }
    }
}

/// Weights for the session health composite. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HealthWeights {
    #[serde(default = "default_health_lines")]
    pub lines: f64,
    #[serde(default = "default_health_errors")]
    pub errors: f64,
    #[serde(default = "default_health_churn")]
    pub churn: f64,
    #[serde(default = "default_health_corrections")]
    pub corrections: f64,
    #[serde(default = "default_health_context")]
    pub context: f64,
}

fn default_health_lines() -> f64 {
    0.15
}

fn default_health_errors() -> f64 {
    0.25
}

fn default_health_churn() -> f64 {
    0.15
}

fn default_health_corrections() -> f64 {
    0.25
}

fn default_health_context() -> f64 {
    0.2
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            lines: default_health_lines(),
            errors: default_health_errors(),
            churn: default_health_churn(),
            corrections: default_health_corrections(),
            context: default_health_context(),
        }
    }
}

impl HealthWeights {
    /// Sum of all components.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.lines + self.errors + self.churn + self.corrections + self.context
    }
}

/// Suggestion validation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationConfig {
    /// Suggestions below this confidence are dropped.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Drop suggestions that contradict high-priority knowledge.
    #[serde(default = "default_block_contradictions")]
    pub block_contradictions: bool,
    /// Similarity to a past rejection that counts as a repeat.
    #[serde(default = "default_rejection_similarity")]
    pub rejection_similarity: f64,
}

fn default_min_confidence() -> f64 {
    0.5
}

fn default_block_contradictions() -> bool {
    true
}

fn default_rejection_similarity() -> f64 {
    0.8
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            block_contradictions: default_block_contradictions(),
            rejection_similarity: default_rejection_similarity(),
        }
    }
}

/// Learning engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningConfig {
    /// Acceptance rate the threshold adaptation steers toward.
    #[serde(default = "default_target_acceptance_rate")]
    pub target_acceptance_rate: f64,
    /// EMA alpha and adaptation step scale.
    #[serde(default = "default_learning_speed")]
    pub learning_speed: f64,
}

fn default_target_acceptance_rate() -> f64 {
    0.75
}

fn default_learning_speed() -> f64 {
    0.1
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            target_acceptance_rate: default_target_acceptance_rate(),
            learning_speed: default_learning_speed(),
        }
    }
}

/// Path rules steering review pressure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReviewRules {
    /// Path fragments that mark edits as high stakes.
    #[serde(default)]
    pub always_review: Vec<String>,
    /// Path fragments whose edits accumulate no review pressure.
    #[serde(default)]
    pub never_review: Vec<String>,
}

impl ReviewRules {
    /// Whether a path matches an `always_review` fragment.
    #[must_use]
    pub fn is_high_stakes(&self, path: &str) -> bool {
        let path = path.to_lowercase();
        self.always_review
            .iter()
            .any(|fragment| path.contains(&fragment.to_lowercase()))
    }

    /// Whether a path matches a `never_review` fragment.
    #[must_use]
    pub fn is_exempt(&self, path: &str) -> bool {
        let path = path.to_lowercase();
        self.never_review
            .iter()
            .any(|fragment| path.contains(&fragment.to_lowercase()))
    }
}

/// Analysis worker provider kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Claude,
    Gemini,
}

/// Configuration for the analysis worker client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Provider to use (claude or gemini).
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model to use for analysis.
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Base URL for the API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable name for the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Overall deadline for one worker call, in seconds.
    #[serde(default = "default_worker_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_worker_timeout_secs() -> u64 {
    60
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_worker_timeout_secs(),
        }
    }
}

/// Bounds for the worker deadline.
pub const WORKER_TIMEOUT_MIN_SECS: u64 = 30;
pub const WORKER_TIMEOUT_MAX_SECS: u64 = 120;

/// Context bundle limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleConfig {
    /// Hard cap on the rendered bundle, in characters.
    #[serde(default = "default_max_bundle_chars")]
    pub max_chars: usize,
    /// Per-file excerpt cap, in characters.
    #[serde(default = "default_max_file_chars")]
    pub max_file_chars: usize,
}

fn default_max_bundle_chars() -> usize {
    5000
}

fn default_max_file_chars() -> usize {
    2000
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_bundle_chars(),
            max_file_chars: default_max_file_chars(),
        }
    }
}

/// Top-level configuration for the sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SentinelConfig {
    #[serde(default)]
    pub triggers: TriggerConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub health: HealthWeights,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub review: ReviewRules,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub bundle: BundleConfig,
}

impl SentinelConfig {
    /// Check invariants the rest of the system relies on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the offending field when a
    /// weight vector does not sum to 1.0, a fraction is out of range, or
    /// the worker deadline falls outside its allowed band.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let relevance_sum = self.knowledge.relevance.sum();
        if (relevance_sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfigError::Invalid {
                field: "knowledge.relevance",
                reason: format!("weights must sum to 1.0, got {relevance_sum}"),
            });
        }
        let health_sum = self.health.sum();
        if (health_sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfigError::Invalid {
                field: "health",
                reason: format!("weights must sum to 1.0, got {health_sum}"),
            });
        }
        if !(0.0..=1.0).contains(&self.triggers.context_warning_percent) {
            return Err(ConfigError::Invalid {
                field: "triggers.context_warning_percent",
                reason: format!(
                    "must be within 0.0..=1.0, got {}",
                    self.triggers.context_warning_percent
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.validation.min_confidence) {
            return Err(ConfigError::Invalid {
                field: "validation.min_confidence",
                reason: format!(
                    "must be within 0.0..=1.0, got {}",
                    self.validation.min_confidence
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.learning.target_acceptance_rate) {
            return Err(ConfigError::Invalid {
                field: "learning.target_acceptance_rate",
                reason: format!(
                    "must be within 0.0..=1.0, got {}",
                    self.learning.target_acceptance_rate
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.learning.learning_speed) {
            return Err(ConfigError::Invalid {
                field: "learning.learning_speed",
                reason: format!("must be within 0.0..=1.0, got {}", self.learning.learning_speed),
            });
        }
        if !(WORKER_TIMEOUT_MIN_SECS..=WORKER_TIMEOUT_MAX_SECS).contains(&self.worker.timeout_secs)
        {
            return Err(ConfigError::Invalid {
                field: "worker.timeout_secs",
                reason: format!(
                    "must be within {WORKER_TIMEOUT_MIN_SECS}..={WORKER_TIMEOUT_MAX_SECS}, got {}",
                    self.worker.timeout_secs
                ),
            });
        }
        if self.triggers.lines_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "triggers.lines_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
