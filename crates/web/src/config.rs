//! Runtime configuration assembled by the binary.

use std::time::Duration;

use clonescope_analysis::validate_timeout_ms;
use clonescope_core::AppError;
use serde_json::Value;

use crate::provider::ProviderConfig;
use crate::rate_limit::RateLimitConfig;
use crate::retry::RetryOptions;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "127.0.0.1:3000")
    pub bind_address: String,
    /// Allowed CORS origin, or `*` for any
    pub cors_origin: String,
    /// Hide error details from clients
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            cors_origin: "http://localhost:5173".to_string(),
            production: false,
        }
    }
}

/// Analysis service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub analysis_timeout: Duration,
    pub retry: RetryOptions,
    pub rate_limit: RateLimitConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(60),
            retry: RetryOptions::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Build a service configuration, validating the timeout.
    ///
    /// # Errors
    ///
    /// `Validation` if `analysis_timeout_ms` is outside 1000..=60000.
    pub fn new(
        analysis_timeout_ms: u64,
        max_attempts: u32,
        rate_limit: RateLimitConfig,
    ) -> Result<Self, AppError> {
        let timeout_ms = validate_timeout_ms(&Value::from(analysis_timeout_ms))?;
        Ok(Self {
            analysis_timeout: Duration::from_millis(timeout_ms),
            retry: RetryOptions::default().with_max_attempts(max_attempts),
            rate_limit,
        })
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub service: ServiceConfig,
}
