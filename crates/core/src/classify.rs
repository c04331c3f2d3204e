//! Best-effort classification of errors that cross an uncontrolled boundary.
//!
//! Typed [`AppError`]s are authoritative and pass through untouched. Anything
//! else is matched, case-insensitively, against ordered keyword lists on its
//! name and message. Unmatched errors become [`ErrorKind::Internal`] and their
//! raw text stays in the server log.

use std::any::Any;
use std::fmt::Display;

use crate::error::{AppError, ErrorKind, ExternalError};

const PROVIDER: &str = "ai-provider";

/// Keywords indicating a timeout or dropped connection.
pub const TIMEOUT_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "etimedout",
    "econnreset",
    "econnrefused",
    "esockettimedout",
    "socket hang up",
    "network",
];

/// Keywords indicating an exhausted request budget.
pub const RATE_LIMIT_PATTERNS: &[&str] = &["rate limit", "quota", "429", "too many requests"];

/// Keywords indicating rejected provider credentials.
pub const CREDENTIAL_PATTERNS: &[&str] = &["api key", "unauthorized", "401"];

/// Keywords indicating an upstream AI provider failure.
pub const PROVIDER_PATTERNS: &[&str] = &[
    "ai provider",
    "gemini",
    "openai",
    "anthropic",
    "overloaded",
    "502",
    "503",
    "504",
    "bad gateway",
    "unavailable",
];

/// Which rule matched, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matched {
    Timeout,
    RateLimit,
    Credentials,
    Provider,
    Confidence,
    Source,
    Unmatched,
}

/// Match `haystack` against the ordered rule lists.
#[must_use]
pub fn match_patterns(haystack: &str) -> Matched {
    let text = haystack.to_lowercase();
    let any = |patterns: &[&str]| patterns.iter().any(|p| text.contains(p));

    if any(TIMEOUT_PATTERNS) {
        Matched::Timeout
    } else if any(RATE_LIMIT_PATTERNS) {
        Matched::RateLimit
    } else if any(CREDENTIAL_PATTERNS) {
        Matched::Credentials
    } else if any(PROVIDER_PATTERNS) {
        Matched::Provider
    } else if text.contains("confidence") {
        Matched::Confidence
    } else if text.contains("source") {
        Matched::Source
    } else {
        Matched::Unmatched
    }
}

/// Text used for classification: name and message for external errors, the
/// display form otherwise.
pub fn signal_text<E: Display + 'static>(err: &E) -> String {
    let any: &dyn Any = err;
    any.downcast_ref::<ExternalError>().map_or_else(
        || err.to_string(),
        |ext| format!("{} {}", ext.name, ext.message),
    )
}

/// Classify any error onto the taxonomy.
pub fn classify_error<E: Display + 'static>(err: &E) -> AppError {
    let any: &dyn Any = err;
    if let Some(app) = any.downcast_ref::<AppError>() {
        return app.clone();
    }
    classify_text(&signal_text(err))
}

/// Classify raw error text onto the taxonomy.
#[must_use]
pub fn classify_text(raw: &str) -> AppError {
    let classified = match match_patterns(raw) {
        Matched::Timeout => AppError::new(ErrorKind::Timeout, raw),
        Matched::RateLimit => AppError::new(ErrorKind::RateLimit, raw),
        Matched::Credentials => AppError::ai_provider_auth(PROVIDER, raw),
        Matched::Provider => AppError::ai_provider(PROVIDER, raw),
        Matched::Confidence => AppError::confidence_validation(raw),
        Matched::Source => AppError::source_validation(raw),
        Matched::Unmatched => {
            tracing::error!(error = %raw, "Unclassified error, returning generic message");
            return AppError::internal(raw);
        }
    };

    tracing::debug!(
        kind = %classified.kind(),
        code = classified.code(),
        "Classified untyped error"
    );

    classified.with_details(raw)
}
