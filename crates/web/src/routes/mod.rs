//! REST API routes
//!
//! ## Route Structure
//!
//! - `GET /api/health` - Health check endpoint
//! - `POST /api/analyze` - Run and store a new analysis
//! - `GET /api/analyses` - List the caller's analyses, newest first
//! - `GET /api/analyses/{id}` - Fetch one analysis
//! - `POST /api/analyses/{id}/improve` - Generate an improvement plan
//!
//! Callers are identified by the `x-client-id` header, which scopes both
//! storage and rate limiting. Unmatched paths and methods answer with the
//! usual error body.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post},
};
use clonescope_core::{AppError, UNKNOWN_REQUEST_ID};
use serde_json::Value;

use crate::error_handler::ApiError;
use crate::middleware::RequestId;
use crate::service::{AnalysisService, ServiceError};

pub mod analyses;
pub mod health;

/// Header identifying the calling client.
pub const CLIENT_ID_HEADER: &str = "x-client-id";
const ANONYMOUS_CLIENT: &str = "anonymous";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnalysisService>,
    /// Include `details` in error bodies (off in production).
    pub expose_details: bool,
}

impl AppState {
    #[must_use]
    pub fn new(service: Arc<AnalysisService>, production: bool) -> Self {
        Self {
            service,
            expose_details: !production,
        }
    }
}

/// Who is calling, and how to report failures back to them.
#[derive(Debug, Clone)]
pub struct Caller {
    pub client_id: String,
    pub request_id: String,
    expose_details: bool,
}

impl Caller {
    /// Bind a service error to this request.
    pub fn reject(&self, error: impl Into<ServiceError>) -> ApiError {
        ApiError::new(error, self.request_id.clone(), self.expose_details)
    }
}

async fn no_route(caller: Caller) -> ApiError {
    ApiError::no_route(caller.request_id)
}

async fn method_not_allowed(caller: Caller) -> ApiError {
    ApiError::method_not_allowed(caller.request_id)
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let client_id = parts
            .headers
            .get(CLIENT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(ANONYMOUS_CLIENT)
            .to_string();
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map_or_else(|| UNKNOWN_REQUEST_ID.to_string(), |id| id.0.clone());

        Ok(Self {
            client_id,
            request_id,
            expose_details: state.expose_details,
        })
    }
}

/// Parse an optional JSON body. Empty bodies are `None`.
///
/// # Errors
///
/// `Validation` if the body is present but not JSON.
pub fn parse_body(body: &Bytes) -> Result<Option<Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|_| AppError::validation("Request body must be valid JSON"))
}

/// Create the API router. State is attached by the caller.
pub fn create_router() -> Router<AppState> {
    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/analyze", post(analyses::create_analysis))
        .route("/analyses", get(analyses::list_analyses))
        .route("/analyses/{id}", get(analyses::get_analysis))
        .route("/analyses/{id}/improve", post(analyses::improve_analysis))
        .method_not_allowed_fallback(method_not_allowed);

    Router::new().nest("/api", api_routes).fallback(no_route)
}
