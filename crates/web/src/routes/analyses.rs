//! Analysis endpoints
//!
//! - `POST /api/analyze` - Run and store a new analysis (201)
//! - `GET /api/analyses` - List the caller's analyses
//! - `GET /api/analyses/{id}` - Fetch one analysis
//! - `POST /api/analyses/{id}/improve` - Generate an improvement plan
//!
//! Bodies are taken as raw bytes so malformed JSON is reported through the
//! standard error body rather than axum's plain-text rejection.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;

use super::{AppState, Caller, parse_body};
use crate::error_handler::ApiError;
use crate::provider::ImprovementPlan;
use crate::service::AnalysisView;

/// POST /api/analyze - Run and store a new analysis
pub async fn create_analysis(
    State(state): State<AppState>,
    caller: Caller,
    body: Bytes,
) -> Result<(StatusCode, Json<AnalysisView>), ApiError> {
    let body = parse_body(&body)
        .map_err(|e| caller.reject(e))?
        .unwrap_or(Value::Null);

    state
        .service
        .analyze(&caller.client_id, &body)
        .await
        .map(|view| (StatusCode::CREATED, Json(view)))
        .map_err(|e| caller.reject(e))
}

/// GET /api/analyses - List the caller's analyses, newest first
pub async fn list_analyses(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<AnalysisView>>, ApiError> {
    state
        .service
        .list(&caller.client_id)
        .await
        .map(Json)
        .map_err(|e| caller.reject(e))
}

/// GET /api/analyses/{id} - Fetch one analysis
pub async fn get_analysis(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<AnalysisView>, ApiError> {
    state
        .service
        .get(&caller.client_id, &id)
        .await
        .map(Json)
        .map_err(|e| caller.reject(e))
}

/// POST /api/analyses/{id}/improve - Generate an improvement plan
pub async fn improve_analysis(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ImprovementPlan>, ApiError> {
    let body = parse_body(&body).map_err(|e| caller.reject(e))?;

    state
        .service
        .improve(&caller.client_id, &id, body.as_ref())
        .await
        .map(Json)
        .map_err(|e| caller.reject(e))
}
