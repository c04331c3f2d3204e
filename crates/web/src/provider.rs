//! AI provider client.
//!
//! [`AnalysisProvider`] is the seam between the service and the model. The
//! HTTP implementation talks to any OpenAI-compatible chat completions
//! endpoint and maps every transport or HTTP failure onto the error
//! taxonomy at the point it happens.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::time::Duration;

use async_trait::async_trait;
use clonescope_analysis::{EnhancedAnalysis, FirstPartyData};
use clonescope_core::AppError;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const PROVIDER: &str = "openai-compatible";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RATE_LIMIT_RETRY_SECS: u64 = 60;
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "CLONESCOPE_AI_API_KEY";

const ANALYSIS_PROMPT: &str = "You analyze businesses to judge how feasible they are to clone. \
Respond with a single JSON object with keys: \
overview {valueProposition, targetAudience, monetization}, \
market {competitors [{name, url?, notes?}], swot {strengths, weaknesses, opportunities, threats}}, \
technical {techStack, confidence (0-1), uiColors, keyPages}, \
data {trafficEstimates {value, source?}, keyMetrics [{name, value, source?, asOf?}]}, \
synthesis {summary, keyInsights, nextActions}, \
sources [{url, excerpt}] where each excerpt is 10-300 characters quoted from the cited page.";

const IMPROVEMENT_PROMPT: &str = "You suggest how to build a better version of an analyzed business. \
Respond with a single JSON object with keys: summary (string), recommendations (array of strings).";

/// Provider connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Improvement plan generated for a stored analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementPlan {
    pub summary: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Source of raw analyses and improvement plans.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Produce a raw, untrusted analysis payload for `url`.
    ///
    /// # Errors
    ///
    /// Any taxonomy error; callers decide whether to retry.
    async fn analyze(
        &self,
        url: &str,
        goal: Option<&str>,
        first_party: Option<&FirstPartyData>,
    ) -> Result<Value, AppError>;

    /// Produce a raw improvement plan for an existing analysis.
    ///
    /// # Errors
    ///
    /// Any taxonomy error.
    async fn improve(&self, analysis: &EnhancedAnalysis, goal: Option<&str>) -> Result<Value, AppError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client.
#[derive(Debug, Clone)]
pub struct HttpAnalysisProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpAnalysisProvider {
    /// Build a client for `config`.
    ///
    /// # Errors
    ///
    /// `Internal` if the HTTP client cannot be constructed.
    pub fn new(config: ProviderConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn complete(&self, system: &str, user: String) -> Result<Value, AppError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::config_missing(API_KEY_ENV))?;

        let endpoint = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), retry_after, &text));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::ai_provider(PROVIDER, format!("unreadable response body: {e}")))?;

        let content = payload
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or_else(|| AppError::ai_provider(PROVIDER, "response contained no message content"))?;

        extract_json(&content)
            .ok_or_else(|| AppError::ai_provider(PROVIDER, "response did not contain a JSON object"))
    }

    fn transport_error(&self, error: &reqwest::Error) -> AppError {
        if error.is_timeout() {
            AppError::timeout("AI provider request", self.config.request_timeout)
        } else {
            AppError::ai_provider(PROVIDER, format!("request failed: {error}"))
        }
    }
}

#[async_trait]
impl AnalysisProvider for HttpAnalysisProvider {
    async fn analyze(
        &self,
        url: &str,
        goal: Option<&str>,
        first_party: Option<&FirstPartyData>,
    ) -> Result<Value, AppError> {
        let mut prompt = format!("Analyze the business at {url}.");
        if let Some(goal) = goal {
            prompt.push_str(&format!("\nThe user's goal: {goal}"));
        }
        if let Some(data) = first_party {
            let context = serde_json::to_string(data).unwrap_or_default();
            prompt.push_str(&format!("\nMetadata scraped from the site: {context}"));
        }

        tracing::debug!(url, model = %self.config.model, "Requesting analysis");
        self.complete(ANALYSIS_PROMPT, prompt).await
    }

    async fn improve(&self, analysis: &EnhancedAnalysis, goal: Option<&str>) -> Result<Value, AppError> {
        let serialized = serde_json::to_string(analysis)
            .map_err(|e| AppError::improvement_generation(format!("failed to serialize analysis: {e}")))?;
        let mut prompt = format!("Existing analysis: {serialized}");
        if let Some(goal) = goal {
            prompt.push_str(&format!("\nFocus on: {goal}"));
        }

        tracing::debug!(model = %self.config.model, "Requesting improvement plan");
        self.complete(IMPROVEMENT_PROMPT, prompt).await
    }
}

/// Map a non-success HTTP status onto the taxonomy.
#[must_use]
pub fn status_error(status: u16, retry_after_secs: Option<u64>, body: &str) -> AppError {
    let snippet: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    match status {
        401 | 403 => AppError::ai_provider_auth(PROVIDER, format!("HTTP {status}: credentials rejected")),
        429 => AppError::rate_limit(Duration::from_secs(
            retry_after_secs.unwrap_or(DEFAULT_RATE_LIMIT_RETRY_SECS),
        ))
        .with_details(snippet),
        _ => AppError::ai_provider(PROVIDER, format!("HTTP {status}: {snippet}")),
    }
}

/// Pull a JSON object out of model output, with or without code fences.
#[must_use]
pub fn extract_json(content: &str) -> Option<Value> {
    let trimmed = strip_fences(content.trim());

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    trimmed
        .get(start..=end)
        .and_then(|slice| serde_json::from_str::<Value>(slice).ok())
        .filter(Value::is_object)
}

fn strip_fences(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
