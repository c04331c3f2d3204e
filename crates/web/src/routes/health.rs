//! Health check endpoint: GET /api/health

use axum::response::Json;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

fn build_health_response() -> HealthResponse {
    HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// GET /api/health - Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(build_health_response())
}
