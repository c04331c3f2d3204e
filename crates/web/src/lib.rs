//! Clonescope Web Server
//!
//! HTTP API for running, storing and improving cloneability analyses, with
//! tower middleware for request ids, logging, CORS, tracing and compression.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method},
    middleware::from_fn,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

pub mod config;
pub mod error_handler;
pub mod extract;
pub mod middleware;
pub mod provider;
pub mod rate_limit;
pub mod repository;
pub mod retry;
pub mod routes;
pub mod service;

pub use config::{AppConfig, ServerConfig, ServiceConfig};
pub use error_handler::{ApiError, METHOD_NOT_ALLOWED_CODE, NOT_FOUND_CODE};
pub use extract::{FirstPartyExtractor, HttpFirstPartyExtractor};
pub use middleware::{REQUEST_ID_HEADER, RequestId};
pub use provider::{AnalysisProvider, HttpAnalysisProvider, ImprovementPlan, ProviderConfig};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use repository::{AnalysisRepository, InMemoryAnalysisRepository, RepositoryError, StoredAnalysis};
pub use retry::{
    ErrorGuidance, RetryOptions, RetryOutcome, generate_error_guidance, retry_with_backoff,
    retry_with_backoff_notify,
};
pub use routes::{AppState, CLIENT_ID_HEADER};
pub use service::{AnalysisService, AnalysisView, ServiceError};

fn cors_layer(origin: &str) -> Result<CorsLayer, Error> {
    let allow_origin = if origin == "*" {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::exact(origin.parse::<HeaderValue>()?)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)]))
}

/// Create the application router with middleware.
///
/// # Errors
///
/// Returns an error if the configured CORS origin is not a valid header value.
pub fn create_router(state: AppState, config: &ServerConfig) -> Result<Router, Error> {
    info!(cors_origin = %config.cors_origin, production = config.production, "Creating router");

    let router = routes::create_router()
        .with_state(state)
        .layer(from_fn(middleware::logging_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_layer(&config.cors_origin)?),
        );

    Ok(router)
}

/// Web server errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] axum::http::header::InvalidHeaderValue),
}
