//! Core error taxonomy for Clonescope operations.
//!
//! Every failure that can reach a client is an [`AppError`] carrying one of
//! eight closed [`ErrorKind`]s. The kind fixes the HTTP status, the machine
//! code, and the default user-facing message; the error itself carries the
//! server-side message (never shown to clients in production) and an
//! explicit retryable flag.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of failure kinds surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// AI call exceeded its deadline, DNS/connect timeout.
    Timeout,
    /// Malformed input or failed confidence/source validation.
    Validation,
    /// Upstream AI HTTP error, bad API key, provider outage.
    AiProvider,
    /// Target site unreachable or blocked while scraping.
    FirstPartyExtraction,
    /// Secondary business-improvement AI call failed.
    ImprovementGeneration,
    /// Request budget exceeded.
    RateLimit,
    /// Required credential or environment value absent.
    Config,
    /// Unclassified or unexpected failure.
    Internal,
}

impl ErrorKind {
    /// All kinds, in table order.
    pub const ALL: [Self; 8] = [
        Self::Timeout,
        Self::Validation,
        Self::AiProvider,
        Self::FirstPartyExtraction,
        Self::ImprovementGeneration,
        Self::RateLimit,
        Self::Config,
        Self::Internal,
    ];

    /// HTTP status code for this kind.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Timeout => 504,
            Self::Validation => 422,
            Self::AiProvider => 502,
            Self::FirstPartyExtraction | Self::ImprovementGeneration => 503,
            Self::RateLimit => 429,
            Self::Config | Self::Internal => 500,
        }
    }

    /// Machine-readable code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Timeout => "GATEWAY_TIMEOUT",
            Self::Validation => "VALIDATION_ERROR",
            Self::AiProvider => "AI_PROVIDER_DOWN",
            Self::FirstPartyExtraction | Self::ImprovementGeneration => "SERVICE_UNAVAILABLE",
            Self::RateLimit => "RATE_LIMITED",
            Self::Config => "CONFIG_MISSING",
            Self::Internal => "INTERNAL",
        }
    }

    /// Error type name, used in logs.
    #[must_use]
    pub const fn error_type(self) -> &'static str {
        match self {
            Self::Timeout => "TimeoutError",
            Self::Validation => "ValidationError",
            Self::AiProvider => "AIProviderError",
            Self::FirstPartyExtraction => "FirstPartyExtractionError",
            Self::ImprovementGeneration => "ImprovementGenerationError",
            Self::RateLimit => "RateLimitError",
            Self::Config => "ConfigError",
            Self::Internal => "InternalError",
        }
    }

    /// Whether re-attempting after a delay may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::AiProvider
                | Self::FirstPartyExtraction
                | Self::ImprovementGeneration
                | Self::RateLimit
        )
    }

    /// Default message shown to the end user.
    #[must_use]
    pub const fn default_user_message(self) -> &'static str {
        match self {
            Self::Timeout => {
                "The analysis took too long to complete. Please try again in a few moments."
            }
            Self::Validation => "The request or analysis data was invalid. Please check your input.",
            Self::AiProvider => {
                "The AI service is temporarily unavailable. Please try again shortly."
            }
            Self::FirstPartyExtraction => {
                "We could not read the target website. It may be offline or blocking automated access."
            }
            Self::ImprovementGeneration => {
                "We could not generate improvement suggestions right now. Please try again shortly."
            }
            Self::RateLimit => "Too many requests. Please wait a moment before trying again.",
            Self::Config => "The service is not configured correctly. Please contact support.",
            Self::Internal => "An unexpected error occurred. Please try again later.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.error_type())
    }
}

/// Application error with a fixed taxonomy kind.
///
/// `message` is server-side only. Clients see `user_message`, and `details`
/// only outside production.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    user_message: String,
    details: Option<String>,
    retryable: bool,
}

impl AppError {
    /// Create an error of `kind` with the kind's default user message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            user_message: kind.default_user_message().to_string(),
            details: None,
            retryable: kind.is_retryable(),
        }
    }

    /// Override the user-facing message.
    #[must_use]
    pub fn with_user_message(mut self, user_message: impl Into<String>) -> Self {
        self.user_message = user_message.into();
        self
    }

    /// Attach debugging details (exposed only outside production).
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Override the retryable flag.
    #[must_use]
    pub const fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Create a timeout error.
    pub fn timeout(operation: &str, after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("{operation} timed out after {}ms", after.as_millis()),
        )
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorKind::Validation, message.clone()).with_details(message)
    }

    /// Create a validation error for a confidence score.
    pub fn confidence_validation(message: impl Into<String>) -> Self {
        Self::validation(message)
            .with_user_message("The analysis contained an invalid confidence score.")
    }

    /// Create a validation error for a source citation.
    pub fn source_validation(message: impl Into<String>) -> Self {
        Self::validation(message).with_user_message("The analysis contained an invalid source citation.")
    }

    /// Create an AI provider error.
    pub fn ai_provider(provider: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::AiProvider,
            format!("{provider}: {}", message.into()),
        )
    }

    /// Create an AI provider credential error. Retrying cannot help.
    pub fn ai_provider_auth(provider: &str, message: impl Into<String>) -> Self {
        Self::ai_provider(provider, message)
            .with_user_message("The AI service rejected our credentials. Please contact support.")
            .with_retryable(false)
    }

    /// Create a first-party extraction error.
    pub fn first_party_extraction(url: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::FirstPartyExtraction,
            format!("failed to extract {url}: {}", message.into()),
        )
    }

    /// Create an improvement generation error.
    pub fn improvement_generation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ImprovementGeneration, message)
    }

    /// Create a rate limit error.
    pub fn rate_limit(retry_after: Duration) -> Self {
        let secs = retry_after.as_secs().max(1);
        Self::new(
            ErrorKind::RateLimit,
            format!("rate limit exceeded, retry after {secs}s"),
        )
        .with_user_message(format!(
            "Too many requests. Please wait {secs} seconds before trying again."
        ))
    }

    /// Create a missing-configuration error.
    pub fn config_missing(name: &str) -> Self {
        Self::new(
            ErrorKind::Config,
            format!("required configuration '{name}' is missing"),
        )
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Taxonomy kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Server-side message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// User-facing message.
    #[must_use]
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Debugging details, if any.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Whether retrying may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Error type name.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        self.kind.error_type()
    }

    /// Convert to the wire body sent to clients.
    ///
    /// `details` is only included when `expose_details` is set (non-production).
    #[must_use]
    pub fn to_body(&self, request_id: Option<&str>, expose_details: bool) -> ErrorBody {
        ErrorBody {
            error: self.user_message.clone(),
            code: self.code().to_string(),
            request_id: request_id
                .filter(|id| !id.is_empty())
                .unwrap_or(UNKNOWN_REQUEST_ID)
                .to_string(),
            details: if expose_details {
                self.details.clone()
            } else {
                None
            },
        }
    }
}

/// Request id used when none was assigned upstream.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Terminal wire format for every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// User-facing message.
    pub error: String,
    /// Machine-readable code.
    pub code: String,
    /// Request id for tracing.
    pub request_id: String,
    /// Debugging details, development only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// An error raised across an uncontrolled boundary, identified by name and
/// message only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct ExternalError {
    /// Error name (e.g. `TimeoutError`).
    pub name: String,
    /// Raw message.
    pub message: String,
}

impl ExternalError {
    /// Create an external error.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}
