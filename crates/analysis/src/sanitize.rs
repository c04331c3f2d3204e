//! Text and URL sanitization shared by every validator.

use serde_json::Value;
use url::Url;

use crate::error::{ValidationError, ValidationKind, ValidationResult};

/// Characters stripped from any text that may be rendered back to a user.
pub const DANGEROUS_CHARS: [char; 5] = ['<', '>', '&', '"', '\''];

/// Maximum excerpt length in characters.
pub const MAX_EXCERPT_LEN: usize = 300;

/// Schemes accepted for every URL-bearing field.
const WEB_SCHEMES: [&str; 2] = ["http", "https"];

/// Remove dangerous characters and non-whitespace control characters.
#[must_use]
pub fn strip_dangerous(input: &str) -> String {
    input
        .chars()
        .filter(|c| !DANGEROUS_CHARS.contains(c))
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect()
}

/// Collapse runs of whitespace into single spaces and trim both ends.
#[must_use]
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters (not bytes).
#[must_use]
pub fn truncate_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((idx, _)) => input.get(..idx).unwrap_or(input).to_string(),
        None => input.to_string(),
    }
}

/// Strip, collapse, and hard-truncate to `max` characters.
#[must_use]
pub fn clean_text(input: &str, max: usize) -> String {
    let collapsed = collapse_whitespace(&strip_dangerous(input));
    truncate_chars(&collapsed, max).trim_end().to_string()
}

/// Parse `input` as an absolute http/https URL.
///
/// # Errors
///
/// `InvalidUrl` if unparseable, `UnsupportedProtocol` for any other scheme.
pub fn parse_web_url(input: &str) -> ValidationResult<Url> {
    let url = Url::parse(input)
        .map_err(|_| ValidationError::new(ValidationKind::InvalidUrl, "Invalid URL format"))?;

    if WEB_SCHEMES.contains(&url.scheme()) {
        Ok(url)
    } else {
        Err(ValidationError::new(
            ValidationKind::UnsupportedProtocol,
            "URL must use http or https protocol",
        ))
    }
}

/// Whether `input` is an absolute http/https URL.
#[must_use]
pub fn is_web_url(input: &str) -> bool {
    parse_web_url(input).is_ok()
}

/// Validate a URL and return the parser's canonical form.
///
/// Bare domains gain a trailing slash (`https://example.com` becomes
/// `https://example.com/`).
///
/// # Errors
///
/// See [`parse_web_url`].
pub fn sanitize_url(input: &str) -> ValidationResult<String> {
    parse_web_url(input).map(String::from)
}

/// Sanitize an untrusted excerpt.
///
/// # Errors
///
/// `InvalidType` if the value is not a string.
pub fn sanitize_excerpt(value: &Value) -> ValidationResult<String> {
    value
        .as_str()
        .map(|s| clean_text(s, MAX_EXCERPT_LEN))
        .ok_or_else(|| ValidationError::new(ValidationKind::InvalidType, "Excerpt must be a string"))
}
