//! Retry logic with exponential backoff and optional jitter.
//!
//! Wraps an async operation and re-runs it while its failures look
//! transient. Retryability comes from [`classify_error`], the same rules the
//! error boundary applies, unless the options carry an override list. The loop
//! stops early when the configured [`CancellationToken`] fires, and dropping
//! the returned future stops it as well.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use clonescope_core::{ErrorKind, classify_error, signal_text};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_DELAY_MS: u64 = 1_000;
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Factor applied to the delay after each retry.
    pub backoff_multiplier: f64,
    /// Upper bound for the delay.
    pub max_delay: Duration,
    /// Overrides the retryability decision with a substring list.
    pub retryable_errors: Option<Vec<String>>,
    /// Random extra delay as a fraction of the current delay (0.0 - 1.0).
    pub jitter_factor: f64,
    /// Stops the loop between attempts.
    pub cancel: Option<CancellationToken>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            retryable_errors: None,
            jitter_factor: 0.0,
            cancel: None,
        }
    }
}

impl RetryOptions {
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn with_retryable_errors<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_errors = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub const fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Whether `error` is worth another attempt.
    pub fn is_retryable<E: Display + 'static>(&self, error: &E) -> bool {
        match &self.retryable_errors {
            Some(patterns) => {
                let text = signal_text(error).to_lowercase();
                patterns.iter().any(|p| text.contains(&p.to_lowercase()))
            }
            None => classify_error(error).is_retryable(),
        }
    }

    /// Delay after `current`: multiplied and capped at `max_delay`.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return delay;
        }
        let range = delay.as_secs_f64() * self.jitter_factor.min(1.0);
        let extra = rand::thread_rng().gen_range(0.0..=range);
        delay.saturating_add(Duration::from_secs_f64(extra))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Result of a retried operation.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success {
        data: T,
        attempts: u32,
        total_time: Duration,
    },
    Failure {
        error: E,
        attempts: u32,
        total_time: Duration,
    },
    /// The cancellation token fired before the operation succeeded.
    Cancelled { attempts: u32, total_time: Duration },
}

impl<T, E> RetryOutcome<T, E> {
    /// Attempts made before the outcome was decided.
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. }
            | Self::Failure { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Wall time spent including sleeps.
    pub const fn total_time(&self) -> Duration {
        match self {
            Self::Success { total_time, .. }
            | Self::Failure { total_time, .. }
            | Self::Cancelled { total_time, .. } => *total_time,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Run `operation` with exponential backoff.
pub async fn retry_with_backoff<T, E, F, Fut>(operation: F, options: &RetryOptions) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + 'static,
{
    retry_with_backoff_notify(operation, options, |_, _| {}).await
}

/// Run `operation` with exponential backoff, calling `on_retry(error, attempt)`
/// before each sleep.
pub async fn retry_with_backoff_notify<T, E, F, Fut, N>(
    mut operation: F,
    options: &RetryOptions,
    mut on_retry: N,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + 'static,
    N: FnMut(&E, u32),
{
    let start = Instant::now();
    let max_attempts = options.max_attempts.max(1);
    let mut delay = options.delay;
    let mut attempt = 0;

    loop {
        if options.is_cancelled() {
            tracing::info!(attempts = attempt, "Retry loop cancelled");
            return RetryOutcome::Cancelled {
                attempts: attempt,
                total_time: start.elapsed(),
            };
        }

        attempt += 1;
        let error = match operation().await {
            Ok(data) => {
                return RetryOutcome::Success {
                    data,
                    attempts: attempt,
                    total_time: start.elapsed(),
                };
            }
            Err(error) => error,
        };

        if !options.is_retryable(&error) || attempt >= max_attempts {
            tracing::debug!(attempts = attempt, error = %error, "Giving up");
            return RetryOutcome::Failure {
                error,
                attempts: attempt,
                total_time: start.elapsed(),
            };
        }

        on_retry(&error, attempt);
        let sleep = options.jittered(delay);
        tracing::warn!(
            attempt,
            max_attempts,
            delay_ms = sleep.as_millis(),
            error = %error,
            "Attempt failed, retrying"
        );

        match &options.cancel {
            Some(token) => {
                tokio::select! {
                    () = token.cancelled() => {
                        tracing::info!(attempts = attempt, "Retry loop cancelled during backoff");
                        return RetryOutcome::Cancelled {
                            attempts: attempt,
                            total_time: start.elapsed(),
                        };
                    }
                    () = tokio::time::sleep(sleep) => {}
                }
            }
            None => tokio::time::sleep(sleep).await,
        }

        delay = options.next_delay(delay);
    }
}

/// Actionable guidance for an end user after a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorGuidance {
    pub user_message: String,
    pub next_steps: Vec<String>,
    pub retryable: bool,
    /// Suggested wait in seconds before trying again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_time: Option<u64>,
}

/// Map an error to user guidance using the same classification as the
/// error boundary.
pub fn generate_error_guidance<E: Display + 'static>(error: &E, context: Option<&str>) -> ErrorGuidance {
    let classified = classify_error(error);

    let (next_steps, estimated_wait_time): (&[&str], Option<u64>) = match classified.kind() {
        ErrorKind::Timeout => (
            &[
                "Wait a moment and try again",
                "Try a simpler goal to shorten the analysis",
            ],
            Some(30),
        ),
        ErrorKind::RateLimit => (
            &[
                "Wait before sending another request",
                "Batch related questions into one analysis",
            ],
            Some(60),
        ),
        ErrorKind::AiProvider if classified.is_retryable() => (
            &[
                "The AI service is having trouble, try again in a few minutes",
                "Check the service status page if the problem persists",
            ],
            Some(120),
        ),
        ErrorKind::AiProvider | ErrorKind::Config => (
            &["Contact support, this needs a configuration change"],
            None,
        ),
        ErrorKind::FirstPartyExtraction => (
            &[
                "Check that the website is publicly reachable",
                "Try the site's homepage instead of a deep link",
            ],
            Some(30),
        ),
        ErrorKind::ImprovementGeneration => (
            &["Try again, or rephrase your improvement goal"],
            Some(30),
        ),
        ErrorKind::Validation => (&["Check your input and try again"], None),
        ErrorKind::Internal => (
            &["Try again later", "Contact support if the problem persists"],
            None,
        ),
    };

    let user_message = match context {
        Some(context) => format!("{context} failed. {}", classified.user_message()),
        None => classified.user_message().to_string(),
    };

    ErrorGuidance {
        user_message,
        next_steps: next_steps.iter().map(ToString::to_string).collect(),
        retryable: classified.is_retryable(),
        estimated_wait_time,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;
    use clonescope_core::{AppError, ExternalError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryOptions {
        RetryOptions::default()
            .with_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
    }

    #[test]
    fn test_defaults() {
        let options = RetryOptions::default();
        assert_eq!(options.max_attempts, 3);
        assert_eq!(options.delay, Duration::from_millis(1000));
        assert_eq!(options.max_delay, Duration::from_millis(10_000));
        assert!((options.backoff_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_next_delay_is_capped() {
        let options = RetryOptions::default();
        assert_eq!(options.next_delay(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(options.next_delay(Duration::from_secs(8)), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let options = RetryOptions::default().with_jitter(0.5);
        for _ in 0..50 {
            let d = options.jittered(Duration::from_millis(100));
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_retryability() {
        let options = RetryOptions::default();
        assert!(options.is_retryable(&ExternalError::new("TimeoutError", "took too long")));
        assert!(options.is_retryable(&ExternalError::new("Error", "HTTP 503 Service Unavailable")));
        assert!(!options.is_retryable(&ExternalError::new("Error", "Invalid api key")));
        assert!(!options.is_retryable(&AppError::validation("bad")));
        assert!(options.is_retryable(&AppError::ai_provider("openai", "bad gateway")));
        assert!(!options.is_retryable(&AppError::ai_provider_auth("openai", "401")));
    }

    #[test]
    fn test_override_list_wins() {
        let options = RetryOptions::default().with_retryable_errors(["flaky"]);
        assert!(options.is_retryable(&ExternalError::new("Error", "Flaky upstream")));
        assert!(!options.is_retryable(&ExternalError::new("TimeoutError", "slow")));
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let outcome: RetryOutcome<u32, ExternalError> =
            retry_with_backoff(|| async { Ok(7) }, &fast()).await;

        match outcome {
            RetryOutcome::Success { data, attempts, .. } => {
                assert_eq!(data, 7);
                assert_eq!(attempts, 1);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_twice_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let retries = Arc::new(AtomicU32::new(0));

        let outcome = retry_with_backoff_notify(
            || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ExternalError::new("TimeoutError", "request took too long"))
                    } else {
                        Ok("done")
                    }
                }
            },
            &fast(),
            |_, _| {
                retries.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(retries.load(Ordering::SeqCst), 2);
    }

    async fn attempts_for(message: &'static str) -> u32 {
        let outcome: RetryOutcome<(), ExternalError> =
            retry_with_backoff(|| async move { Err(ExternalError::new("Error", message)) }, &fast()).await;
        outcome.attempts()
    }

    #[tokio::test]
    async fn test_untyped_timeout_is_retried() {
        assert_eq!(attempts_for("request timed out").await, 3);
    }

    #[tokio::test]
    async fn test_untyped_provider_failure_is_retried() {
        assert_eq!(attempts_for("Gemini API returned 500").await, 3);
    }

    #[tokio::test]
    async fn test_unmatched_error_is_not_retried() {
        assert_eq!(attempts_for("secret db password").await, 1);
    }

    #[tokio::test]
    async fn test_api_key_failure_stops_immediately() {
        let retries = AtomicU32::new(0);
        let outcome: RetryOutcome<(), ExternalError> = retry_with_backoff_notify(
            || async { Err(ExternalError::new("Error", "Invalid api key provided")) },
            &RetryOptions::default(),
            |_, _| {
                retries.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert!(outcome.total_time() < Duration::from_millis(500));
        match outcome {
            RetryOutcome::Failure { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(retries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let outcome: RetryOutcome<(), AppError> = retry_with_backoff(
            || async { Err(AppError::timeout("analysis", Duration::from_secs(1))) },
            &fast().with_max_attempts(4),
        )
        .await;

        match outcome {
            RetryOutcome::Failure { error, attempts, .. } => {
                assert_eq!(attempts, 4);
                assert_eq!(error.kind(), ErrorKind::Timeout);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();

        let outcome: RetryOutcome<(), ExternalError> =
            retry_with_backoff(|| async { Ok(()) }, &fast().with_cancellation(token)).await;

        assert!(matches!(outcome, RetryOutcome::Cancelled { attempts: 0, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_during_backoff() {
        let token = CancellationToken::new();
        let options = RetryOptions::default()
            .with_delay(Duration::from_secs(30))
            .with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let outcome: RetryOutcome<(), ExternalError> = retry_with_backoff(
            || async { Err(ExternalError::new("Error", "network unreachable")) },
            &options,
        )
        .await;

        canceller.await.unwrap();
        assert!(matches!(outcome, RetryOutcome::Cancelled { attempts: 1, .. }));
        assert!(outcome.total_time() < Duration::from_secs(30));
    }

    #[test]
    fn test_guidance_for_rate_limit() {
        let guidance = generate_error_guidance(&ExternalError::new("Error", "429 Too Many Requests"), None);
        assert!(guidance.retryable);
        assert_eq!(guidance.estimated_wait_time, Some(60));
        assert!(!guidance.next_steps.is_empty());
    }

    #[test]
    fn test_guidance_for_credentials() {
        let guidance = generate_error_guidance(
            &ExternalError::new("Error", "Invalid API key"),
            Some("Analysis"),
        );
        assert!(!guidance.retryable);
        assert_eq!(guidance.estimated_wait_time, None);
        assert!(guidance.user_message.starts_with("Analysis failed."));
    }

    #[test]
    fn test_guidance_for_unknown_error_hides_text() {
        let guidance = generate_error_guidance(&ExternalError::new("Error", "secret db password"), None);
        assert!(!guidance.retryable);
        assert!(!guidance.user_message.contains("secret"));
    }
}
