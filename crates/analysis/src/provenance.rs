//! Confidence scores and source attribution.
//!
//! Pure functions, no I/O. Individual sources are all-or-nothing; list
//! validation fails fast and names the offending index.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ValidationError, ValidationKind, ValidationResult};
use crate::first_party::FirstPartyData;
use crate::sanitize::{MAX_EXCERPT_LEN, parse_web_url, truncate_chars};

/// Confidence below this is surfaced to users as "Speculative".
pub const SPECULATIVE_THRESHOLD: f64 = 0.6;

/// Minimum excerpt length in characters.
pub const MIN_EXCERPT_LEN: usize = 10;

/// Minimum length for a first-party field to be used as the target-site excerpt.
pub const MIN_TARGET_EXCERPT_LEN: usize = 20;

const ELLIPSIS: &str = "...";

/// A citation backing a claim in the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub excerpt: String,
}

impl Source {
    /// Create a source without validating it.
    pub fn new(url: impl Into<String>, excerpt: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            excerpt: excerpt.into(),
        }
    }

    /// Validate this source.
    ///
    /// # Errors
    ///
    /// `InvalidFormat` unless the url is http/https and the excerpt length
    /// lies in `[10, 300]`.
    pub fn validate(self) -> ValidationResult<Self> {
        if parse_web_url(&self.url).is_err() {
            return Err(ValidationError::new(
                ValidationKind::InvalidFormat,
                format!("Invalid source URL: '{}'", self.url),
            ));
        }

        let len = self.excerpt.chars().count();
        if !(MIN_EXCERPT_LEN..=MAX_EXCERPT_LEN).contains(&len) {
            return Err(ValidationError::new(
                ValidationKind::InvalidFormat,
                format!(
                    "Source excerpt must be between {MIN_EXCERPT_LEN} and {MAX_EXCERPT_LEN} characters, got {len}"
                ),
            ));
        }

        Ok(self)
    }
}

/// Validate an optional confidence score from untrusted JSON.
///
/// # Errors
///
/// `InvalidType` for non-numbers, otherwise see [`check_confidence`].
pub fn validate_confidence_score(value: Option<&Value>) -> ValidationResult<Option<f64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| {
                ValidationError::new(ValidationKind::InvalidType, "Confidence must be a number")
            })
            .and_then(check_confidence)
            .map(Some),
        Some(_) => Err(ValidationError::new(
            ValidationKind::InvalidType,
            "Confidence must be a number",
        )),
    }
}

/// Check a numeric confidence score. Valid values are returned unchanged.
///
/// # Errors
///
/// `NotANumber` for NaN, `OutOfRange` outside `[0, 1]`.
pub fn check_confidence(value: f64) -> ValidationResult<f64> {
    if value.is_nan() {
        return Err(ValidationError::new(
            ValidationKind::NotANumber,
            "Confidence must not be NaN",
        ));
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::new(
            ValidationKind::OutOfRange,
            format!("Confidence must be between 0 and 1, got {value}"),
        ));
    }
    Ok(value)
}

/// Whether an analysis with this confidence should be flagged as speculative.
#[must_use]
pub fn is_speculative(confidence: Option<f64>) -> bool {
    confidence.is_some_and(|c| c < SPECULATIVE_THRESHOLD)
}

/// Validate a single source from untrusted JSON.
///
/// # Errors
///
/// `InvalidFormat` if the value is not a `{url, excerpt}` object or fails
/// [`Source::validate`].
pub fn validate_source(value: &Value) -> ValidationResult<Source> {
    let field = |key: &str| value.get(key).and_then(Value::as_str);
    match (field("url"), field("excerpt")) {
        (Some(url), Some(excerpt)) => Source::new(url, excerpt).validate(),
        _ => Err(ValidationError::new(
            ValidationKind::InvalidFormat,
            "Source must have string url and excerpt fields",
        )),
    }
}

/// Validate a list of sources, failing on the first invalid entry.
///
/// # Errors
///
/// `NotAnArray` if the value is not a list; otherwise the first entry's
/// error prefixed with `Source at index {i}`.
pub fn validate_sources(value: &Value) -> ValidationResult<Vec<Source>> {
    let items = value.as_array().ok_or_else(|| {
        ValidationError::new(ValidationKind::NotAnArray, "Sources must be an array")
    })?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_source(item).map_err(|e| e.context(format!("Source at index {i}"))))
        .collect()
}

/// Prepend the target site as a source when first-party data exists.
///
/// No-op without first-party data, when `target_url` cannot be parsed, when
/// any existing source shares the target's host, or when none of description,
/// h1 and text snippet (tried in that order) is long enough to serve as an
/// excerpt. Host comparison makes this
/// insensitive to trailing-slash canonicalization. Idempotent.
#[must_use]
pub fn add_target_site_as_source(
    sources: Vec<Source>,
    target_url: &str,
    first_party: Option<&FirstPartyData>,
) -> Vec<Source> {
    let Some(data) = first_party else {
        return sources;
    };
    let Some(target_host) = host_of(target_url) else {
        return sources;
    };
    if sources
        .iter()
        .any(|s| host_of(&s.url).is_some_and(|h| h == target_host))
    {
        return sources;
    }

    let Some(excerpt) = target_excerpt(data) else {
        tracing::debug!(target_url, "No first-party field long enough for a target-site excerpt");
        return sources;
    };

    std::iter::once(Source::new(target_url, excerpt))
        .chain(sources)
        .collect()
}

fn host_of(url: &str) -> Option<String> {
    parse_web_url(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

fn target_excerpt(data: &FirstPartyData) -> Option<String> {
    [&data.description, &data.h1, &data.text_snippet]
        .into_iter()
        .map(|s| s.trim())
        .find(|s| s.chars().count() >= MIN_TARGET_EXCERPT_LEN)
        .map(|s| {
            if s.chars().count() > MAX_EXCERPT_LEN {
                let keep = MAX_EXCERPT_LEN.saturating_sub(ELLIPSIS.len());
                format!("{}{ELLIPSIS}", truncate_chars(s, keep))
            } else {
                s.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use serde_json::json;

    fn first_party(description: &str, h1: &str) -> FirstPartyData {
        FirstPartyData {
            title: "T".to_string(),
            description: description.to_string(),
            h1: h1.to_string(),
            text_snippet: "x".to_string(),
            url: "https://example.com".to_string(),
        }
    }

    #[test]
    fn test_confidence_absent_is_valid() {
        assert_eq!(validate_confidence_score(None).unwrap(), None);
        assert_eq!(validate_confidence_score(Some(&Value::Null)).unwrap(), None);
    }

    #[test]
    fn test_confidence_boundaries() {
        for v in [0.0, 0.5, 0.6, 1.0] {
            assert_eq!(validate_confidence_score(Some(&json!(v))).unwrap(), Some(v));
        }
    }

    #[test]
    fn test_confidence_out_of_range() {
        for v in [-0.01, 1.5, 100.0] {
            let err = validate_confidence_score(Some(&json!(v))).unwrap_err();
            assert_eq!(err.kind(), ValidationKind::OutOfRange);
        }
    }

    #[test]
    fn test_confidence_wrong_type() {
        let err = validate_confidence_score(Some(&json!("0.8"))).unwrap_err();
        assert_eq!(err.kind(), ValidationKind::InvalidType);
    }

    #[test]
    fn test_confidence_nan() {
        let err = check_confidence(f64::NAN).unwrap_err();
        assert_eq!(err.kind(), ValidationKind::NotANumber);
    }

    #[test]
    fn test_is_speculative() {
        assert!(is_speculative(Some(0.59)));
        assert!(!is_speculative(Some(0.6)));
        assert!(!is_speculative(Some(0.9)));
        assert!(!is_speculative(None));
    }

    #[test]
    fn test_validate_source_ok() {
        let source = validate_source(&json!({
            "url": "https://example.com/about",
            "excerpt": "We build widgets for everyone."
        }))
        .unwrap();
        assert_eq!(source.url, "https://example.com/about");
    }

    #[test]
    fn test_validate_source_rejects_bad_parts() {
        let short = json!({"url": "https://example.com", "excerpt": "too short"});
        assert_eq!(
            validate_source(&short).unwrap_err().kind(),
            ValidationKind::InvalidFormat
        );

        let long = json!({"url": "https://example.com", "excerpt": "a".repeat(301)});
        assert!(validate_source(&long).is_err());

        let ftp = json!({"url": "ftp://example.com", "excerpt": "long enough excerpt"});
        assert!(validate_source(&ftp).is_err());

        assert!(validate_source(&json!({"url": "https://example.com"})).is_err());
    }

    #[test]
    fn test_validate_sources_reports_index() {
        let list = json!([
            {"url": "https://a.com", "excerpt": "valid excerpt here"},
            {"url": "nope", "excerpt": "valid excerpt here"},
        ]);
        let err = validate_sources(&list).unwrap_err();
        assert!(err.message().starts_with("Source at index 1:"), "{}", err.message());
    }

    #[test]
    fn test_validate_sources_not_array() {
        let err = validate_sources(&json!({"url": "x"})).unwrap_err();
        assert_eq!(err.kind(), ValidationKind::NotAnArray);
    }

    #[test]
    fn test_add_target_site_prepends() {
        let existing = vec![Source::new("https://other.com", "An existing excerpt")];
        let data = first_party("This is a valid description long enough", "H");
        let out = add_target_site_as_source(existing, "https://example.com", Some(&data));

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "https://example.com");
        assert_eq!(out[0].excerpt, "This is a valid description long enough");
        assert_eq!(out[1].url, "https://other.com");
    }

    #[test]
    fn test_add_target_site_is_idempotent() {
        let data = first_party("This is a valid description long enough", "H");
        let once = add_target_site_as_source(Vec::new(), "https://example.com", Some(&data));
        let twice = add_target_site_as_source(once.clone(), "https://example.com", Some(&data));

        assert_eq!(once.len(), 1);
        assert_eq!(once[0].url, "https://example.com");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_add_target_site_ignores_trailing_slash() {
        let data = first_party("This is a valid description long enough", "H");
        let existing = vec![Source::new("https://example.com/", "Already cited page")];
        let out = add_target_site_as_source(existing.clone(), "https://example.com", Some(&data));
        assert_eq!(out, existing);
    }

    #[test]
    fn test_add_target_site_without_first_party() {
        let out = add_target_site_as_source(Vec::new(), "https://example.com", None);
        assert!(out.is_empty());
    }

    #[test]
    fn test_add_target_site_falls_back_to_h1() {
        let data = first_party("short", "A heading that is long enough");
        let out = add_target_site_as_source(Vec::new(), "https://example.com", Some(&data));
        assert_eq!(out[0].excerpt, "A heading that is long enough");
    }

    #[test]
    fn test_add_target_site_falls_back_to_text_snippet() {
        let mut data = first_party("short", "H");
        data.text_snippet = "Acme builds dependable widgets for small teams".to_string();

        let out = add_target_site_as_source(Vec::new(), "https://example.com", Some(&data));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].excerpt, "Acme builds dependable widgets for small teams");
    }

    #[test]
    fn test_add_target_site_skipped_when_every_field_is_short() {
        let data = first_party("short", "H");
        let out = add_target_site_as_source(Vec::new(), "https://example.com", Some(&data));
        assert!(out.is_empty());
    }

    #[test]
    fn test_add_target_site_truncates_with_marker() {
        let data = first_party(&"d".repeat(450), "");
        let out = add_target_site_as_source(Vec::new(), "https://example.com", Some(&data));
        assert_eq!(out[0].excerpt.chars().count(), MAX_EXCERPT_LEN);
        assert!(out[0].excerpt.ends_with("..."));
        assert!(out[0].clone().validate().is_ok());
    }
}
