//! Result type definition and extension traits for Railway-Oriented Programming.
//!
//! Provides combinators for the "degrade, don't reject" paths: a failed
//! optional step is logged and turned into `None` instead of propagating.

use std::fmt::Display;

use crate::error::AppError;

/// The standard Result type for Clonescope operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Extension trait providing logged fallbacks for any Result.
pub trait ResultExt<T, E> {
    /// Convert to an Option, logging the error at warn level with `context`.
    fn into_option_logged(self, context: &str) -> Option<T>;

    /// Get the value or a default, logging the error at warn level with `context`.
    fn or_default_logged(self, context: &str, default: T) -> T;
}

impl<T, E: Display> ResultExt<T, E> for std::result::Result<T, E> {
    fn into_option_logged(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "{context}");
                None
            }
        }
    }

    fn or_default_logged(self, context: &str, default: T) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "{context}, using default");
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_option_logged() {
        let ok: std::result::Result<u8, String> = Ok(3);
        assert_eq!(ok.into_option_logged("ctx"), Some(3));

        let err: std::result::Result<u8, String> = Err("nope".to_string());
        assert_eq!(err.into_option_logged("ctx"), None);
    }

    #[test]
    fn test_or_default_logged() {
        let err: std::result::Result<Vec<u8>, String> = Err("bad".to_string());
        assert!(err.or_default_logged("ctx", Vec::new()).is_empty());
    }

    #[test]
    fn test_or_default_logged_keeps_ok_value() {
        let ok: std::result::Result<Vec<u8>, String> = Ok(vec![1, 2]);
        assert_eq!(ok.or_default_logged("ctx", Vec::new()), vec![1, 2]);
    }
}
