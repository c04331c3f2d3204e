//! Analysis service: the request pipeline behind the HTTP routes.
//!
//! `analyze` validates input, enforces the client's rate limit, scrapes
//! first-party data (best effort), calls the provider under retry and an
//! overall deadline, repairs the payload and stores it as a versioned
//! document. Shutdown cancels in-flight retry loops through the shared
//! [`CancellationToken`].

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use clonescope_analysis::{
    AnalysisRequest, EnhancedAnalysis, FirstPartyData, ValidationError, finalize_analysis,
    validate_analysis_id_str, validate_analysis_request, validate_improvement_request,
};
use clonescope_core::{AppError, ErrorKind, ResultExt};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::extract::FirstPartyExtractor;
use crate::provider::{AnalysisProvider, ImprovementPlan};
use crate::rate_limit::RateLimiter;
use crate::repository::{AnalysisRepository, RepositoryError, StoredAnalysis};
use crate::retry::{RetryOptions, RetryOutcome, generate_error_guidance, retry_with_backoff};

/// Errors surfaced by the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A taxonomy error.
    #[error(transparent)]
    App(#[from] AppError),

    /// The requested analysis does not exist for this client.
    #[error("Analysis not found: {0}")]
    NotFound(Uuid),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        Self::App(err.into())
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { id } => Self::NotFound(id),
            other => Self::App(AppError::internal(other.to_string())),
        }
    }
}

/// Client-facing view of a stored analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisView {
    pub id: Uuid,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub analysis: EnhancedAnalysis,
    /// Shown as the "Speculative" badge.
    pub speculative: bool,
    pub improvements: Vec<ImprovementPlan>,
}

impl AnalysisView {
    /// Build a view, upgrading legacy documents.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the stored document is corrupt.
    pub fn from_record(record: &StoredAnalysis) -> Result<Self, ValidationError> {
        let analysis = record.analysis()?;
        Ok(Self {
            id: record.id,
            url: record.url.clone(),
            goal: record.goal.clone(),
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
            speculative: analysis.is_speculative(),
            analysis,
            improvements: record.improvements.clone(),
        })
    }
}

pub struct AnalysisService {
    repository: Arc<dyn AnalysisRepository>,
    provider: Arc<dyn AnalysisProvider>,
    extractor: Arc<dyn FirstPartyExtractor>,
    limiter: RateLimiter,
    retry: RetryOptions,
    timeout: Duration,
    shutdown: CancellationToken,
}

impl AnalysisService {
    #[must_use]
    pub fn new(
        repository: Arc<dyn AnalysisRepository>,
        provider: Arc<dyn AnalysisProvider>,
        extractor: Arc<dyn FirstPartyExtractor>,
        config: ServiceConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            repository,
            provider,
            extractor,
            limiter: RateLimiter::new(config.rate_limit),
            retry: config.retry.with_cancellation(shutdown.clone()),
            timeout: config.analysis_timeout,
            shutdown,
        }
    }

    /// Token cancelled on shutdown.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run a new analysis for `client_id` and store it.
    ///
    /// # Errors
    ///
    /// Validation, rate limit, provider, timeout, or storage failures.
    pub async fn analyze(&self, client_id: &str, body: &Value) -> Result<AnalysisView, ServiceError> {
        let request = validate_analysis_request(body)?;
        self.limiter.check(client_id).await?;

        let first_party = self.first_party(&request.url).await;
        let raw = self.call_provider(&request, first_party.as_ref()).await?;
        let analysis = finalize_analysis(&raw, &request.url, first_party.as_ref())?;

        tracing::info!(
            client_id,
            url = %request.url,
            sources = analysis.sources.len(),
            speculative = analysis.is_speculative(),
            "Analysis completed"
        );

        let record = StoredAnalysis::new(client_id, request.url, request.goal, analysis)
            .map_err(|e| AppError::internal(format!("failed to serialize analysis: {e}")))?;
        let stored = self.repository.create(record).await?;
        Ok(AnalysisView::from_record(&stored)?)
    }

    /// The client's analyses, newest first. Corrupt records are skipped.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list(&self, client_id: &str) -> Result<Vec<AnalysisView>, ServiceError> {
        let records = self.repository.list(client_id).await?;
        Ok(records
            .iter()
            .filter_map(|r| AnalysisView::from_record(r).into_option_logged("Skipping unreadable analysis"))
            .collect())
    }

    /// One of the client's analyses.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed ids, `NotFound` for unknown ones.
    pub async fn get(&self, client_id: &str, id: &str) -> Result<AnalysisView, ServiceError> {
        let record = self.record(client_id, id).await?;
        Ok(AnalysisView::from_record(&record)?)
    }

    /// Generate and store an improvement plan for an existing analysis.
    ///
    /// # Errors
    ///
    /// Validation and lookup failures, or `ImprovementGeneration` when the
    /// provider fails.
    pub async fn improve(
        &self,
        client_id: &str,
        id: &str,
        body: Option<&Value>,
    ) -> Result<ImprovementPlan, ServiceError> {
        let request = validate_improvement_request(body)?;
        let mut record = self.record(client_id, id).await?;
        self.limiter.check(client_id).await?;

        let analysis = record.analysis()?;
        let raw = self
            .provider
            .improve(&analysis, request.goal.as_deref())
            .await
            .map_err(as_improvement_error)?;
        let plan: ImprovementPlan = serde_json::from_value(raw).map_err(|e| {
            AppError::improvement_generation(format!("malformed improvement plan: {e}"))
        })?;

        record.push_improvement(plan.clone());
        self.repository.update(record).await?;
        Ok(plan)
    }

    async fn record(&self, client_id: &str, id: &str) -> Result<StoredAnalysis, ServiceError> {
        let id = validate_analysis_id_str(id)?;
        let id = Uuid::parse_str(&id).map_err(|_| AppError::validation("Invalid analysis ID format"))?;
        Ok(self.repository.get(client_id, id).await?)
    }

    async fn first_party(&self, url: &str) -> Option<FirstPartyData> {
        self.extractor
            .extract(url)
            .await
            .into_option_logged("First-party extraction failed, continuing without it")
    }

    async fn call_provider(
        &self,
        request: &AnalysisRequest,
        first_party: Option<&FirstPartyData>,
    ) -> Result<Value, AppError> {
        let attempt = || {
            self.provider
                .analyze(&request.url, request.goal.as_deref(), first_party)
        };

        let outcome = tokio::time::timeout(self.timeout, retry_with_backoff(attempt, &self.retry))
            .await
            .map_err(|_| AppError::timeout("Analysis", self.timeout))?;

        match outcome {
            RetryOutcome::Success {
                data,
                attempts,
                total_time,
            } => {
                tracing::debug!(attempts, total_ms = total_time.as_millis(), "Provider call succeeded");
                Ok(data)
            }
            RetryOutcome::Failure {
                error,
                attempts,
                total_time,
            } => {
                let guidance = generate_error_guidance(&error, Some("Analysis"));
                tracing::warn!(
                    attempts,
                    total_ms = total_time.as_millis(),
                    code = error.code(),
                    next_steps = ?guidance.next_steps,
                    "Provider call failed"
                );
                Err(error)
            }
            RetryOutcome::Cancelled { attempts, .. } => {
                tracing::info!(attempts, "Provider call cancelled by shutdown");
                Err(shutting_down())
            }
        }
    }
}

fn shutting_down() -> AppError {
    AppError::new(ErrorKind::Internal, "analysis cancelled during shutdown")
        .with_user_message("The server is shutting down. Please try again shortly.")
}

fn as_improvement_error(err: AppError) -> AppError {
    match err.kind() {
        ErrorKind::ImprovementGeneration | ErrorKind::RateLimit | ErrorKind::Config => err,
        _ => {
            let retryable = err.is_retryable();
            AppError::improvement_generation(err.message().to_string()).with_retryable(retryable)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;
    use crate::extract::FirstPartyExtractor;
    use crate::rate_limit::RateLimitConfig;
    use crate::repository::InMemoryAnalysisRepository;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn payload() -> Value {
        json!({
            "overview": {"valueProposition": "v", "targetAudience": "t", "monetization": "m"},
            "market": {"competitors": []},
            "technical": {"techStack": ["Rails"], "confidence": 0.4},
            "synthesis": {"summary": "s", "keyInsights": [], "nextActions": []}
        })
    }

    struct FlakyProvider {
        calls: AtomicU32,
        failures: u32,
        error: fn() -> AppError,
    }

    #[async_trait]
    impl AnalysisProvider for FlakyProvider {
        async fn analyze(&self, _: &str, _: Option<&str>, _: Option<&FirstPartyData>) -> Result<Value, AppError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err((self.error)())
            } else {
                Ok(payload())
            }
        }

        async fn improve(&self, _: &EnhancedAnalysis, _: Option<&str>) -> Result<Value, AppError> {
            Err((self.error)())
        }
    }

    struct NoSite;

    #[async_trait]
    impl FirstPartyExtractor for NoSite {
        async fn extract(&self, url: &str) -> Result<FirstPartyData, AppError> {
            Err(AppError::first_party_extraction(url, "connection refused"))
        }
    }

    fn service(provider: FlakyProvider, config: ServiceConfig) -> AnalysisService {
        AnalysisService::new(
            Arc::new(InMemoryAnalysisRepository::new()),
            Arc::new(provider),
            Arc::new(NoSite),
            config,
            CancellationToken::new(),
        )
    }

    fn fast_config() -> ServiceConfig {
        ServiceConfig {
            retry: RetryOptions::default().with_delay(Duration::from_millis(1)),
            ..ServiceConfig::default()
        }
    }

    #[tokio::test]
    async fn test_retries_transient_provider_errors() {
        let provider = FlakyProvider {
            calls: AtomicU32::new(0),
            failures: 2,
            error: || AppError::ai_provider("test", "503 overloaded"),
        };
        let service = service(provider, fast_config());

        let view = service
            .analyze("alice", &json!({"url": "https://example.com"}))
            .await
            .unwrap();
        assert_eq!(view.url, "https://example.com/");
        assert!(view.speculative);
        assert!(view.analysis.sources.is_empty());
    }

    #[tokio::test]
    async fn test_credential_errors_are_not_retried() {
        let provider = FlakyProvider {
            calls: AtomicU32::new(0),
            failures: 5,
            error: || AppError::ai_provider_auth("test", "401"),
        };
        let service = service(provider, fast_config());

        let err = service
            .analyze("alice", &json!({"url": "https://example.com"}))
            .await
            .unwrap_err();
        match err {
            ServiceError::App(e) => assert_eq!(e.kind(), ErrorKind::AiProvider),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_applies_per_client() {
        let provider = FlakyProvider {
            calls: AtomicU32::new(0),
            failures: 0,
            error: || AppError::internal("unused"),
        };
        let config = ServiceConfig {
            rate_limit: RateLimitConfig::new(1, Duration::from_secs(60)),
            ..fast_config()
        };
        let service = service(provider, config);
        let body = json!({"url": "https://example.com"});

        assert!(service.analyze("alice", &body).await.is_ok());
        assert!(service.analyze("bob", &body).await.is_ok());
        let err = service.analyze("alice", &body).await.unwrap_err();
        assert!(matches!(err, ServiceError::App(ref e) if e.kind() == ErrorKind::RateLimit));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_retry_loop() {
        let provider = FlakyProvider {
            calls: AtomicU32::new(0),
            failures: 10,
            error: || AppError::ai_provider("test", "overloaded"),
        };
        let config = ServiceConfig {
            retry: RetryOptions::default().with_delay(Duration::from_secs(30)),
            ..ServiceConfig::default()
        };
        let service = service(provider, config);
        service.shutdown_token().cancel();

        let err = service
            .analyze("alice", &json!({"url": "https://example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::App(ref e) if e.kind() == ErrorKind::Internal));
    }

    #[tokio::test]
    async fn test_improvement_failures_are_improvement_errors() {
        let provider = FlakyProvider {
            calls: AtomicU32::new(0),
            failures: 0,
            error: || AppError::ai_provider("test", "overloaded"),
        };
        let service = service(provider, fast_config());
        let view = service
            .analyze("alice", &json!({"url": "https://example.com"}))
            .await
            .unwrap();

        let err = service
            .improve("alice", &view.id.to_string(), None)
            .await
            .unwrap_err();
        match err {
            ServiceError::App(e) => {
                assert_eq!(e.kind(), ErrorKind::ImprovementGeneration);
                assert!(e.is_retryable());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_unknown_and_malformed_ids() {
        let provider = FlakyProvider {
            calls: AtomicU32::new(0),
            failures: 0,
            error: || AppError::internal("unused"),
        };
        let service = service(provider, fast_config());

        let missing = service
            .get("alice", "123e4567-e89b-12d3-a456-426614174000")
            .await
            .unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));

        let malformed = service.get("alice", "not-a-uuid").await.unwrap_err();
        assert!(matches!(malformed, ServiceError::App(ref e) if e.kind() == ErrorKind::Validation));
    }
}
