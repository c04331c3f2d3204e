//! Validation failures as explicit values.
//!
//! Every synchronous validator returns [`ValidationResult`]; nothing in this
//! crate unwinds to signal invalid input.

use clonescope_core::AppError;
use thiserror::Error;

/// Why a value failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    /// Value has the wrong JSON type.
    InvalidType,
    /// Numeric value is NaN.
    NotANumber,
    /// Numeric value is outside its allowed range.
    OutOfRange,
    /// Structured value (source, URL) is malformed.
    InvalidFormat,
    /// Expected a list.
    NotAnArray,
    /// Analysis payload is not a JSON object.
    AnalysisMustBeObject,
    /// Required value is missing.
    Required,
    /// Value is empty after trimming.
    Empty,
    /// Value exceeds its length limit.
    TooLong,
    /// Value matches the harmful-content denylist.
    HarmfulContent,
    /// URL scheme is not http or https.
    UnsupportedProtocol,
    /// URL cannot be parsed.
    InvalidUrl,
    /// Identifier does not match the expected shape.
    Malformed,
    /// Repaired analysis does not match the typed schema.
    SchemaMismatch,
}

/// A validation failure with a contract message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    kind: ValidationKind,
    message: String,
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(kind: ValidationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Failure kind.
    #[must_use]
    pub const fn kind(&self) -> ValidationKind {
        self.kind
    }

    /// Contract message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with context, keeping the kind.
    #[must_use]
    pub fn context(self, prefix: impl std::fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{prefix}: {}", self.message),
        }
    }
}

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Contract messages are safe to show to clients; schema mismatches carry
/// parser output and keep the generic user message.
impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err.kind {
            ValidationKind::SchemaMismatch => AppError::validation(err.message),
            _ => AppError::validation(err.message.clone()).with_user_message(err.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clonescope_core::ErrorKind;

    #[test]
    fn test_context_keeps_kind() {
        let err = ValidationError::new(ValidationKind::InvalidFormat, "bad url").context("Source at index 2");
        assert_eq!(err.kind(), ValidationKind::InvalidFormat);
        assert_eq!(err.message(), "Source at index 2: bad url");
    }

    #[test]
    fn test_contract_message_reaches_user() {
        let app: AppError = ValidationError::new(ValidationKind::Required, "URL is required").into();
        assert_eq!(app.kind(), ErrorKind::Validation);
        assert_eq!(app.status_code(), 422);
        assert_eq!(app.user_message(), "URL is required");
        assert!(!app.is_retryable());
    }

    #[test]
    fn test_schema_mismatch_keeps_generic_message() {
        let app: AppError =
            ValidationError::new(ValidationKind::SchemaMismatch, "missing field `overview`").into();
        assert_eq!(app.user_message(), ErrorKind::Validation.default_user_message());
        assert_eq!(app.details(), Some("missing field `overview`"));
    }
}
