//! Property-based tests for error classification.
//!
//! Uses proptest to validate:
//! - Classification is total and never exposes raw text for internal errors
//! - Keyword matching is case-insensitive
//! - Wire bodies always carry a request id

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use clonescope_core::{AppError, ErrorKind, ExternalError, classify_error, classify_text};
use proptest::prelude::*;

fn case_mix(text: &str, mask: u64) -> String {
    text.chars()
        .enumerate()
        .map(|(i, c)| {
            if mask >> (i % 64) & 1 == 1 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

proptest! {
    /// Property: unmatched text becomes Internal with no details
    #[test]
    fn prop_unmatched_text_is_internal(raw in "[bcdfghjkmnpqvwxz ]{0,80}") {
        let err = classify_text(&raw);
        prop_assert_eq!(err.kind(), ErrorKind::Internal);
        prop_assert_eq!(err.details(), None);
        prop_assert_eq!(err.user_message(), ErrorKind::Internal.default_user_message());
    }

    /// Property: timeout keywords win regardless of case and surrounding text
    #[test]
    fn prop_timeout_keyword_case_insensitive(
        prefix in "[a-z ]{0,20}",
        suffix in "[a-z ]{0,20}",
        mask in any::<u64>(),
    ) {
        let raw = format!("{prefix}{}{suffix}", case_mix("timeout", mask));
        prop_assert_eq!(classify_text(&raw).kind(), ErrorKind::Timeout);
    }

    /// Property: external errors are classified by name as well as message
    #[test]
    fn prop_external_error_name_is_a_signal(message in "[bcdfghjkmnpqvwxz ]{0,40}") {
        let err = ExternalError::new("TimeoutError", message);
        prop_assert_eq!(classify_error(&err).kind(), ErrorKind::Timeout);
    }

    /// Property: every error body has a non-empty request id
    #[test]
    fn prop_body_request_id_never_empty(
        kind_idx in 0usize..ErrorKind::ALL.len(),
        request_id in proptest::option::of("[a-z0-9-]{0,36}"),
        expose in any::<bool>(),
    ) {
        let kind = ErrorKind::ALL.get(kind_idx).copied().unwrap_or(ErrorKind::Internal);
        let body = AppError::new(kind, "boom").to_body(request_id.as_deref(), expose);
        prop_assert!(!body.request_id.is_empty());
        prop_assert_eq!(body.code, kind.code());
    }
}
