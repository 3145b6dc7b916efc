//! Worker prompt templates.
//!
//! Each task kind has a built-in template; a TOML file in the state
//! directory's `templates/` overrides it. Templates carry the prompt
//! text (with a `{context}` placeholder) and optional validation-rule
//! overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ValidationConfig};

use super::TaskKind;

const REVIEW_PROMPT: &str = r#"You are reviewing code changes from an active coding session.

{context}

Examine the material above for bugs, violated project conventions and risky patterns.
Respond with ONLY a JSON array. Each element:
{"text": "<one actionable suggestion>", "category": "<security|performance|correctness|style|testing|error_analysis>", "file": "<path or omit>", "line": <number or omit>}
Return [] if nothing is worth raising."#;

const PLAN_PROMPT: &str = r#"You are sanity-checking a plan for an active coding session.

{context}

Point out missing steps, known project pitfalls and simpler alternatives.
Respond with ONLY a JSON array. Each element:
{"text": "<one actionable suggestion>", "category": "<correctness|architecture|testing|scope>", "file": "<path or omit>", "line": <number or omit>}
Return [] if the plan looks sound."#;

const DEBUG_PROMPT: &str = r#"You are helping debug a recurring failure in an active coding session.

{context}

Suggest likely root causes and concrete next diagnostics, most likely first.
Respond with ONLY a JSON array. Each element:
{"text": "<one actionable suggestion>", "category": "<error_analysis|correctness|testing>", "file": "<path or omit>", "line": <number or omit>}
Return [] if you have nothing beyond what was tried."#;

/// Per-template validation overrides. Unset fields fall back to the
/// global validation config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRules {
    #[serde(default)]
    pub min_confidence: Option<f64>,
    #[serde(default)]
    pub block_contradictions: Option<bool>,
    /// Setting this false disables confidence filtering entirely.
    #[serde(default = "default_filter_suggestions")]
    pub filter_suggestions: bool,
}

fn default_filter_suggestions() -> bool {
    true
}

impl Default for TemplateRules {
    fn default() -> Self {
        Self {
            min_confidence: None,
            block_contradictions: None,
            filter_suggestions: default_filter_suggestions(),
        }
    }
}

/// Validation settings after merging a template over the global config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveRules {
    pub min_confidence: f64,
    pub block_contradictions: bool,
    pub filter_suggestions: bool,
    pub rejection_similarity: f64,
}

impl TemplateRules {
    /// Merge over the global validation config.
    #[must_use]
    pub fn effective(&self, config: &ValidationConfig) -> EffectiveRules {
        EffectiveRules {
            min_confidence: self.min_confidence.unwrap_or(config.min_confidence),
            block_contradictions: self
                .block_contradictions
                .unwrap_or(config.block_contradictions),
            filter_suggestions: self.filter_suggestions,
            rejection_similarity: config.rejection_similarity,
        }
    }
}

/// A worker prompt template for one task kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub name: String,
    /// One-line focus shown in the bundle header.
    #[serde(default)]
    pub focus: String,
    /// Prompt text; must contain a `{context}` placeholder.
    pub prompt: String,
    #[serde(default)]
    pub rules: TemplateRules,
}

impl TaskTemplate {
    /// Built-in template for a task kind.
    #[must_use]
    pub fn builtin(kind: TaskKind) -> Self {
        let (focus, prompt) = match kind {
            TaskKind::Review => ("correctness and project conventions", REVIEW_PROMPT),
            TaskKind::Plan => ("completeness and known pitfalls", PLAN_PROMPT),
            TaskKind::Debug => ("root cause analysis", DEBUG_PROMPT),
        };
        Self {
            name: kind.template_name().to_string(),
            focus: focus.to_string(),
            prompt: prompt.to_string(),
            rules: TemplateRules::default(),
        }
    }

    /// Load the template for `kind`, preferring a file override in
    /// `templates_dir`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when an override file exists but is
    /// malformed or lacks the `{context}` placeholder. A missing file is
    /// not an error.
    pub async fn load(templates_dir: &Path, kind: TaskKind) -> Result<Self, ConfigError> {
        let path = templates_dir.join(format!("{}.toml", kind.template_name()));
        let template = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                tracing::debug!(path = %path.display(), "Loading template override");
                toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                    path: path.clone(),
                    source: e,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::builtin(kind),
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: path.clone(),
                    source: e,
                })
            }
        };
        template.check()?;
        Ok(template)
    }

    /// Verify the template can actually be rendered.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when the `{context}` placeholder is
    /// missing.
    pub fn check(&self) -> Result<(), ConfigError> {
        if !self.prompt.contains("{context}") {
            return Err(ConfigError::Invalid {
                field: "template.prompt",
                reason: format!("template '{}' lacks the {{context}} placeholder", self.name),
            });
        }
        Ok(())
    }

    /// Substitute the bundle into the prompt.
    #[must_use]
    pub fn render(&self, context: &str) -> String {
        self.prompt.replace("{context}", context)
    }
}
