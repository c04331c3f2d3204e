//! CLI definitions using clap. Every flag has an environment fallback.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::time::Duration;

use clap::Parser;
use clonescope_core::AppError;
use clonescope_web::{AppConfig, ProviderConfig, RateLimitConfig, ServerConfig, ServiceConfig};

/// Clonescope - business cloneability analysis service
#[derive(Parser, Debug)]
#[command(name = "clonescope")]
#[command(version)]
#[command(about = "Serve validated AI business analyses with provenance")]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "CLONESCOPE_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Allowed CORS origin, or `*` for any
    #[arg(long, env = "CLONESCOPE_CORS_ORIGIN", default_value = "http://localhost:5173")]
    pub cors_origin: String,

    /// Hide error details from clients
    #[arg(long, env = "CLONESCOPE_PRODUCTION", default_value_t = false)]
    pub production: bool,

    /// Base URL of the OpenAI-compatible provider
    #[arg(long, env = "CLONESCOPE_AI_BASE_URL")]
    pub ai_base_url: Option<String>,

    /// Provider API key
    #[arg(long, env = "CLONESCOPE_AI_API_KEY", hide_env_values = true)]
    pub ai_api_key: Option<String>,

    /// Provider model name
    #[arg(long, env = "CLONESCOPE_AI_MODEL")]
    pub ai_model: Option<String>,

    /// Overall deadline for one analysis, in milliseconds (1000-60000)
    #[arg(long, env = "CLONESCOPE_ANALYSIS_TIMEOUT_MS", default_value_t = 60_000)]
    pub analysis_timeout_ms: u64,

    /// Provider attempts per analysis, including the first
    #[arg(long, env = "CLONESCOPE_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Requests allowed per client per window
    #[arg(long, env = "CLONESCOPE_RATE_LIMIT", default_value_t = 10)]
    pub rate_limit: u32,

    /// Rate limit window length in seconds
    #[arg(long, env = "CLONESCOPE_RATE_WINDOW_SECS", default_value_t = 60)]
    pub rate_window_secs: u64,
}

impl Cli {
    /// Assemble the application configuration.
    ///
    /// # Errors
    ///
    /// `Validation` if the analysis timeout is out of range.
    pub fn into_config(self) -> Result<AppConfig, AppError> {
        let defaults = ProviderConfig::default();
        let provider = ProviderConfig {
            base_url: self.ai_base_url.unwrap_or(defaults.base_url),
            api_key: self.ai_api_key.filter(|key| !key.trim().is_empty()),
            model: self.ai_model.unwrap_or(defaults.model),
            request_timeout: defaults.request_timeout,
        };

        let rate_limit = RateLimitConfig::new(self.rate_limit, Duration::from_secs(self.rate_window_secs));
        let service = ServiceConfig::new(self.analysis_timeout_ms, self.max_attempts, rate_limit)?;

        Ok(AppConfig {
            server: ServerConfig {
                bind_address: self.bind,
                cors_origin: self.cors_origin,
                production: self.production,
            },
            provider,
            service,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use clonescope_core::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = Cli::try_parse_from(["clonescope"]).unwrap().into_config().unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1:3000");
        assert_eq!(config.service.analysis_timeout, Duration::from_secs(60));
        assert_eq!(config.service.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "clonescope",
            "--bind",
            "0.0.0.0:8080",
            "--production",
            "--ai-model",
            "gpt-4o",
            "--analysis-timeout-ms",
            "15000",
            "--rate-limit",
            "2",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert!(config.server.production);
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.service.analysis_timeout, Duration::from_secs(15));
        assert_eq!(config.service.rate_limit.requests_per_window, 2);
    }

    #[test]
    fn test_timeout_out_of_range_is_rejected() {
        let cli = Cli::try_parse_from(["clonescope", "--analysis-timeout-ms", "120000"]).unwrap();
        let err = cli.into_config().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), "Timeout must be at most 60000ms");
    }
}
