//! First-party metadata extraction from the target site.

#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use clonescope_analysis::{FirstPartyData, validate_first_party_data};
use clonescope_analysis::first_party::MAX_SNIPPET_LEN;
use clonescope_core::AppError;
use scraper::{Html, Selector};
use serde_json::{Value, json};

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("clonescope/", env!("CARGO_PKG_VERSION"));

struct PageSelectors {
    title: Selector,
    description: Selector,
    h1: Selector,
    paragraph: Selector,
}

#[expect(clippy::expect_used)]
static SELECTORS: LazyLock<PageSelectors> = LazyLock::new(|| {
    let parse = |s: &str| Selector::parse(s).expect("hardcoded selector is valid");
    PageSelectors {
        title: parse("title"),
        description: parse(r#"meta[name="description"]"#),
        h1: parse("h1"),
        paragraph: parse("p"),
    }
});

/// Source of first-party metadata.
#[async_trait]
pub trait FirstPartyExtractor: Send + Sync {
    /// Fetch and sanitize metadata for `url`.
    ///
    /// # Errors
    ///
    /// `FirstPartyExtraction` if the site cannot be fetched or yields no
    /// usable metadata.
    async fn extract(&self, url: &str) -> Result<FirstPartyData, AppError>;
}

/// Fetches the page over HTTP and reads its metadata with `scraper`.
#[derive(Debug, Clone)]
pub struct HttpFirstPartyExtractor {
    client: reqwest::Client,
}

impl HttpFirstPartyExtractor {
    /// # Errors
    ///
    /// `Internal` if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
    }

    /// # Errors
    ///
    /// `Internal` if the HTTP client cannot be constructed.
    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FirstPartyExtractor for HttpFirstPartyExtractor {
    async fn extract(&self, url: &str) -> Result<FirstPartyData, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::first_party_extraction(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::first_party_extraction(url, format!("HTTP {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AppError::first_party_extraction(url, e.to_string()))?;

        validate_first_party_data(&parse_page(&html, url))
            .ok_or_else(|| AppError::first_party_extraction(url, "page metadata failed validation"))
    }
}

/// Read raw, unsanitized metadata from an HTML document.
#[must_use]
pub fn parse_page(html: &str, url: &str) -> Value {
    let document = Html::parse_document(html);
    let selectors = &*SELECTORS;

    let first_text = |selector: &Selector| {
        document
            .select(selector)
            .next()
            .map(|el| el.text().collect::<String>())
    };

    let description = document
        .select(&selectors.description)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string);

    let snippet = document
        .select(&selectors.paragraph)
        .flat_map(|p| p.text())
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_SNIPPET_LEN)
        .collect::<String>();

    json!({
        "url": url,
        "title": first_text(&selectors.title),
        "description": description,
        "h1": first_text(&selectors.h1),
        "textSnippet": snippet,
    })
}
