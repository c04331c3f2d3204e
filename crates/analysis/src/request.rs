//! Validation of externally supplied inputs, run before any expensive work.
//!
//! Error messages are part of the API contract and are asserted verbatim by
//! tests and clients.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ValidationError, ValidationKind, ValidationResult};
use crate::sanitize::sanitize_url;

/// Maximum goal length in characters.
pub const MAX_GOAL_LEN: usize = 500;

/// Default lower bound for timeouts, in milliseconds.
pub const DEFAULT_MIN_TIMEOUT_MS: u64 = 1_000;
/// Default upper bound for timeouts, in milliseconds.
pub const DEFAULT_MAX_TIMEOUT_MS: u64 = 60_000;

/// Case-insensitive substrings rejected in improvement goals.
pub const HARMFUL_PATTERNS: [&str; 5] = ["<script", "javascript:", "onclick=", "<iframe", "eval("];

#[expect(clippy::expect_used)]
static UUID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("hardcoded regex pattern is valid")
});

/// A validated analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Canonical target URL.
    pub url: String,
    /// Optional trimmed user goal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

/// A validated improvement request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovementRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

fn invalid(kind: ValidationKind, message: &str) -> ValidationError {
    ValidationError::new(kind, message)
}

/// Validate the body of an analysis request.
///
/// The URL is returned in the parser's canonical form, so bare domains gain
/// a trailing slash.
///
/// # Errors
///
/// Returns the contract message for the first failing field.
pub fn validate_analysis_request(body: &Value) -> ValidationResult<AnalysisRequest> {
    let url = match body.get("url") {
        None | Some(Value::Null) => return Err(invalid(ValidationKind::Required, "URL is required")),
        Some(Value::String(s)) => s.trim(),
        Some(_) => return Err(invalid(ValidationKind::InvalidType, "URL must be a string")),
    };
    if url.is_empty() {
        return Err(invalid(ValidationKind::Empty, "URL cannot be empty"));
    }

    Ok(AnalysisRequest {
        url: sanitize_url(url)?,
        goal: validate_goal(body.get("goal"))?,
    })
}

/// Validate the body of an improvement request. A missing or null body is
/// an empty request.
///
/// # Errors
///
/// Goal errors as in [`validate_analysis_request`], plus `HarmfulContent`.
pub fn validate_improvement_request(body: Option<&Value>) -> ValidationResult<ImprovementRequest> {
    let Some(body) = body.filter(|b| !b.is_null()) else {
        return Ok(ImprovementRequest::default());
    };

    let goal = validate_goal(body.get("goal"))?;
    if let Some(goal) = &goal {
        let lowered = goal.to_lowercase();
        if HARMFUL_PATTERNS.iter().any(|p| lowered.contains(p)) {
            return Err(invalid(
                ValidationKind::HarmfulContent,
                "Goal contains potentially harmful content",
            ));
        }
    }

    Ok(ImprovementRequest { goal })
}

fn validate_goal(value: Option<&Value>) -> ValidationResult<Option<String>> {
    let goal = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.trim(),
        Some(_) => return Err(invalid(ValidationKind::InvalidType, "Goal must be a string")),
    };

    if goal.is_empty() {
        return Err(invalid(ValidationKind::Empty, "Goal cannot be empty"));
    }
    if goal.chars().count() > MAX_GOAL_LEN {
        return Err(invalid(
            ValidationKind::TooLong,
            "Goal must be 500 characters or less",
        ));
    }

    Ok(Some(goal.to_string()))
}

/// Validate an analysis id from untrusted JSON.
///
/// # Errors
///
/// Distinguishes missing, wrong type, empty, and malformed ids.
pub fn validate_analysis_id(id: Option<&Value>) -> ValidationResult<String> {
    match id {
        None | Some(Value::Null) => Err(invalid(ValidationKind::Required, "Analysis ID is required")),
        Some(Value::String(s)) => validate_analysis_id_str(s),
        Some(_) => Err(invalid(
            ValidationKind::InvalidType,
            "Analysis ID must be a string",
        )),
    }
}

/// Validate an analysis id taken from a path parameter.
///
/// # Errors
///
/// `Empty` or `Malformed`.
pub fn validate_analysis_id_str(id: &str) -> ValidationResult<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(invalid(ValidationKind::Empty, "Analysis ID cannot be empty"));
    }
    if !UUID_REGEX.is_match(id) {
        return Err(invalid(
            ValidationKind::Malformed,
            "Invalid analysis ID format",
        ));
    }
    Ok(id.to_string())
}

/// Validate a timeout in milliseconds, flooring fractional values.
///
/// # Errors
///
/// `InvalidType` for non-numbers, `OutOfRange` naming the violated bound.
pub fn validate_timeout(value: &Value, min: u64, max: u64) -> ValidationResult<u64> {
    let raw = value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(ValidationKind::InvalidType, "Timeout must be a number"))?;
    let floored = raw.floor();

    #[expect(clippy::cast_precision_loss)]
    let (lower, upper) = (min as f64, max as f64);

    if floored < lower {
        return Err(ValidationError::new(
            ValidationKind::OutOfRange,
            format!("Timeout must be at least {min}ms"),
        ));
    }
    if floored > upper {
        return Err(ValidationError::new(
            ValidationKind::OutOfRange,
            format!("Timeout must be at most {max}ms"),
        ));
    }

    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let millis = floored as u64;
    Ok(millis)
}

/// [`validate_timeout`] with the default 1000..=60000 ms bounds.
///
/// # Errors
///
/// See [`validate_timeout`].
pub fn validate_timeout_ms(value: &Value) -> ValidationResult<u64> {
    validate_timeout(value, DEFAULT_MIN_TIMEOUT_MS, DEFAULT_MAX_TIMEOUT_MS)
}
