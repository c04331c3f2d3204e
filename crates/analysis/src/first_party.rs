//! First-party data: metadata scraped from the target business's own site.
//!
//! Used both as AI context and as a fallback citation. The sanitizer never
//! fails loudly; it degrades to `None` or a best-effort record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sanitize::{clean_text, is_web_url};

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 200;
/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 300;
/// Maximum h1 length in characters.
pub const MAX_H1_LEN: usize = 200;
/// Maximum text snippet length in characters.
pub const MAX_SNIPPET_LEN: usize = 500;

/// Title used when the page has none.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Sanitized metadata extracted from the target website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstPartyData {
    pub title: String,
    pub description: String,
    pub h1: String,
    pub text_snippet: String,
    pub url: String,
}

/// Validate and sanitize raw extracted metadata.
///
/// Returns `None` if `raw` is not an object or its `url` is not an
/// http/https URL.
#[must_use]
pub fn validate_first_party_data(raw: &Value) -> Option<FirstPartyData> {
    let Some(obj) = raw.as_object() else {
        tracing::debug!("First-party data is not an object, discarding");
        return None;
    };

    let url = obj.get("url").and_then(Value::as_str).filter(|u| is_web_url(u));
    let Some(url) = url else {
        tracing::debug!("First-party data has no valid url, discarding");
        return None;
    };

    let field = |key: &str, max: usize, default: &str| {
        coerce_text(obj.get(key)).map_or_else(|| default.to_string(), |s| clean_text(&s, max))
    };

    Some(FirstPartyData {
        title: field("title", MAX_TITLE_LEN, DEFAULT_TITLE),
        description: field("description", MAX_DESCRIPTION_LEN, ""),
        h1: field("h1", MAX_H1_LEN, ""),
        text_snippet: field("textSnippet", MAX_SNIPPET_LEN, ""),
        url: url.to_string(),
    })
}

/// Coerce a JSON scalar to text. Falsy values (missing, null, false, 0, "")
/// yield `None` so the caller applies its default.
fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}
