//! Multi-provider client for the analysis worker.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::config::{
    ProviderKind, WorkerConfig, WORKER_TIMEOUT_MAX_SECS, WORKER_TIMEOUT_MIN_SECS,
};

use super::parse::{parse_suggestions, RawSuggestion};

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request timeout for HTTP requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// System prompt for the analysis worker.
pub const ANALYST_SYSTEM_PROMPT: &str = r#"You are a code review analyst embedded in a development session.

You receive a context bundle: the task, excerpts of the files involved,
known project patterns, gotchas and past corrections.

Ground every suggestion in the provided context. Never repeat anything
listed under "Previously Rejected".

Respond with a JSON array only. Each element:
{"text": "...", "category": "...", "file": "optional", "line": 0}
where category is one of: security, performance, correctness, style,
testing, error_analysis.
"#;

/// Build an HTTP client with proper timeout configuration.
fn build_http_client() -> Client {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client")
}

/// Determine if a request should be retried based on status code and attempt count.
fn should_retry(status_code: u16, attempt: u32) -> bool {
    if attempt >= MAX_RETRIES {
        return false;
    }
    // Retry on 5xx server errors
    (500..600).contains(&status_code)
}

/// Calculate exponential backoff duration for retry attempts.
fn calculate_backoff(attempt: u32) -> Duration {
    // Exponential backoff: 1s, 2s, 4s
    Duration::from_secs(1 << attempt)
}

/// Errors from analysis worker operations.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("API key not configured (env: {0})")]
    MissingApiKey(String),
    #[error("Analysis request failed: {0}")]
    RequestFailed(String),
    #[error("Failed to parse analysis response: {0}")]
    ParseError(String),
    #[error("Analysis worker timed out after {0}s")]
    Timeout(u64),
}

/// Trait for analysis workers.
#[async_trait]
pub trait AnalysisWorker: Send + Sync {
    /// Generate a response from the worker.
    async fn generate(&self, system: &str, user: &str) -> Result<String, WorkerError>;
}

/// Gemini API provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    #[must_use]
    pub fn new(base_url: String, api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client: build_http_client(),
            base_url,
            api_key,
            model,
            max_tokens,
        }
    }
}

#[async_trait]
impl AnalysisWorker for GeminiProvider {
    async fn generate(&self, system: &str, user: &str) -> Result<String, WorkerError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": user }]
            }],
            "systemInstruction": {
                "parts": [{ "text": system }]
            },
            "generationConfig": {
                "maxOutputTokens": self.max_tokens
            }
        });

        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| WorkerError::RequestFailed(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                let json: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| WorkerError::ParseError(e.to_string()))?;

                // Extract text from Gemini response format
                return json["candidates"][0]["content"]["parts"][0]["text"]
                    .as_str()
                    .map(String::from)
                    .ok_or_else(|| {
                        WorkerError::ParseError("No text in Gemini response".to_string())
                    });
            }

            let status_code = status.as_u16();
            if should_retry(status_code, attempt) {
                let backoff = calculate_backoff(attempt);
                tracing::debug!(status = status_code, attempt, "Retrying worker request");
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            let text = response.text().await.unwrap_or_default();
            return Err(WorkerError::RequestFailed(format!("HTTP {status}: {text}")));
        }
    }
}

/// Claude API provider.
#[derive(Debug, Clone)]
pub struct ClaudeProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeProvider {
    /// Create a new Claude provider.
    #[must_use]
    pub fn new(base_url: String, api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client: build_http_client(),
            base_url,
            api_key,
            model,
            max_tokens,
        }
    }
}

#[async_trait]
impl AnalysisWorker for ClaudeProvider {
    async fn generate(&self, system: &str, user: &str) -> Result<String, WorkerError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": [{
                "role": "user",
                "content": user
            }]
        });

        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| WorkerError::RequestFailed(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                let json: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| WorkerError::ParseError(e.to_string()))?;

                // Extract text from Claude response format
                return json["content"][0]["text"]
                    .as_str()
                    .map(String::from)
                    .ok_or_else(|| {
                        WorkerError::ParseError("No text in Claude response".to_string())
                    });
            }

            let status_code = status.as_u16();
            if should_retry(status_code, attempt) {
                let backoff = calculate_backoff(attempt);
                tracing::debug!(status = status_code, attempt, "Retrying worker request");
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            let text = response.text().await.unwrap_or_default();
            return Err(WorkerError::RequestFailed(format!("HTTP {status}: {text}")));
        }
    }
}

/// Provider enum for dispatch.
#[derive(Debug, Clone)]
pub enum Provider {
    Gemini(GeminiProvider),
    Claude(ClaudeProvider),
}

#[async_trait]
impl AnalysisWorker for Provider {
    async fn generate(&self, system: &str, user: &str) -> Result<String, WorkerError> {
        match self {
            Self::Gemini(p) => p.generate(system, user).await,
            Self::Claude(p) => p.generate(system, user).await,
        }
    }
}

/// Client that turns a rendered prompt into raw suggestions.
#[derive(Debug, Clone)]
pub struct WorkerClient {
    provider: Provider,
    config: WorkerConfig,
}

impl WorkerClient {
    /// Create a new client with the given provider and config.
    #[must_use]
    pub fn new(provider: Provider, config: WorkerConfig) -> Self {
        Self { provider, config }
    }

    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::MissingApiKey` if the configured API key
    /// environment variable is not set.
    pub fn from_config(config: WorkerConfig) -> Result<Self, WorkerError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| WorkerError::MissingApiKey(config.api_key_env.clone()))?;

        let provider = match config.provider {
            ProviderKind::Gemini => Provider::Gemini(GeminiProvider::new(
                config.base_url.clone(),
                api_key,
                config.model.clone(),
                config.max_tokens,
            )),
            ProviderKind::Claude => Provider::Claude(ClaudeProvider::new(
                config.base_url.clone(),
                api_key,
                config.model.clone(),
                config.max_tokens,
            )),
        };

        Ok(Self { provider, config })
    }

    /// Get the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// The enforced deadline for one analysis call, clamped to the
    /// supported range.
    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(
            self.config
                .timeout_secs
                .clamp(WORKER_TIMEOUT_MIN_SECS, WORKER_TIMEOUT_MAX_SECS),
        )
    }

    /// Run one analysis call under the enforced deadline.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Timeout` when the deadline elapses and
    /// `WorkerError::RequestFailed`/`ParseError` for transport and
    /// response failures. Individual malformed suggestions never error;
    /// they are dropped during parsing.
    pub async fn analyze(&self, prompt: &str) -> Result<Vec<RawSuggestion>, WorkerError> {
        let deadline = self.effective_timeout();
        let text = tokio::time::timeout(
            deadline,
            self.provider.generate(ANALYST_SYSTEM_PROMPT, prompt),
        )
        .await
        .map_err(|_| WorkerError::Timeout(deadline.as_secs()))??;

        let suggestions = parse_suggestions(&text);
        tracing::info!(count = suggestions.len(), "Analysis worker returned suggestions");
        Ok(suggestions)
    }
}

/// The one call the review cycle makes against an analysis backend.
///
/// Production uses [`WorkerClient`]; tests substitute deterministic
/// sources so cycles run without network access.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Turn one rendered context bundle into raw suggestions.
    async fn run(&self, bundle: &str) -> Result<Vec<RawSuggestion>, WorkerError>;
}

#[async_trait]
impl SuggestionSource for WorkerClient {
    async fn run(&self, bundle: &str) -> Result<Vec<RawSuggestion>, WorkerError> {
        self.analyze(bundle).await
    }
}
