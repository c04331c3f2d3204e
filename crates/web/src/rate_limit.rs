//! Fixed-window rate limiting keyed by client id.
//!
//! Each client gets `requests_per_window` requests per window. The window
//! starts at the client's first request and resets once it has elapsed.
//! Every check drops expired windows, so idle clients do not accumulate.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::time::{Duration, Instant};

use clonescope_core::AppError;
use tokio::sync::Mutex;

const DEFAULT_REQUESTS_PER_WINDOW: u32 = 10;
const DEFAULT_WINDOW_SECS: u64 = 60;

/// Rate limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: DEFAULT_REQUESTS_PER_WINDOW,
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
        }
    }
}

impl RateLimitConfig {
    pub const fn new(requests_per_window: u32, window: Duration) -> Self {
        Self {
            requests_per_window,
            window,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Per-client fixed-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `client_id`.
    ///
    /// # Errors
    ///
    /// `RateLimit` carrying the time left in the current window.
    pub async fn check(&self, client_id: &str) -> Result<(), AppError> {
        self.check_at(client_id, Instant::now()).await
    }

    async fn check_at(&self, client_id: &str, now: Instant) -> Result<(), AppError> {
        let mut windows = self.windows.lock().await;
        windows.retain(|_, w| now.saturating_duration_since(w.started_at) < self.config.window);

        let window = windows
            .entry(client_id.to_string())
            .or_insert(Window {
                started_at: now,
                count: 0,
            });

        let elapsed = now.saturating_duration_since(window.started_at);

        if window.count >= self.config.requests_per_window {
            let retry_after = self.config.window.saturating_sub(elapsed);
            tracing::warn!(
                client_id,
                limit = self.config.requests_per_window,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            return Err(AppError::rate_limit(retry_after));
        }

        window.count = window.count.saturating_add(1);
        Ok(())
    }
}
