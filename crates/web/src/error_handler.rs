//! Terminal conversion of service and routing errors into HTTP responses.
//!
//! Every error response has the body `{error, code, requestId, details?}`.
//! `error` is always the pre-written user message; `details` only appears
//! outside production.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clonescope_core::{ErrorBody, UNKNOWN_REQUEST_ID};

use crate::service::ServiceError;

/// Code for unknown analysis ids and unmatched routes, outside the error taxonomy.
pub const NOT_FOUND_CODE: &str = "NOT_FOUND";
/// Code for a known path called with the wrong method.
pub const METHOD_NOT_ALLOWED_CODE: &str = "METHOD_NOT_ALLOWED";
const NOT_FOUND_MESSAGE: &str = "Analysis not found";
const NO_ROUTE_MESSAGE: &str = "Route not found";
const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed";

#[derive(Debug)]
enum Failure {
    Service(ServiceError),
    NoRoute,
    MethodNotAllowed,
}

/// A failure bound to the request it failed.
#[derive(Debug)]
pub struct ApiError {
    failure: Failure,
    request_id: String,
    expose_details: bool,
}

impl ApiError {
    pub fn new(error: impl Into<ServiceError>, request_id: impl Into<String>, expose_details: bool) -> Self {
        Self {
            failure: Failure::Service(error.into()),
            request_id: request_id.into(),
            expose_details,
        }
    }

    /// No route matches the request path.
    pub fn no_route(request_id: impl Into<String>) -> Self {
        Self {
            failure: Failure::NoRoute,
            request_id: request_id.into(),
            expose_details: false,
        }
    }

    /// The path exists but not for this method.
    pub fn method_not_allowed(request_id: impl Into<String>) -> Self {
        Self {
            failure: Failure::MethodNotAllowed,
            request_id: request_id.into(),
            expose_details: false,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.failure {
            Failure::Service(ServiceError::App(e)) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Failure::Service(ServiceError::NotFound(_)) | Failure::NoRoute => StatusCode::NOT_FOUND,
            Failure::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Wire body for this error.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let (message, code) = match &self.failure {
            Failure::Service(ServiceError::App(e)) => {
                return e.to_body(Some(self.request_id.as_str()), self.expose_details);
            }
            Failure::Service(ServiceError::NotFound(_)) => (NOT_FOUND_MESSAGE, NOT_FOUND_CODE),
            Failure::NoRoute => (NO_ROUTE_MESSAGE, NOT_FOUND_CODE),
            Failure::MethodNotAllowed => (METHOD_NOT_ALLOWED_MESSAGE, METHOD_NOT_ALLOWED_CODE),
        };
        ErrorBody {
            error: message.to_string(),
            code: code.to_string(),
            request_id: Some(self.request_id.as_str())
                .filter(|id| !id.is_empty())
                .unwrap_or(UNKNOWN_REQUEST_ID)
                .to_string(),
            details: None,
        }
    }

    fn log(&self, status: StatusCode) {
        match &self.failure {
            Failure::Service(ServiceError::App(e)) if status.is_server_error() => tracing::error!(
                request_id = %self.request_id,
                code = e.code(),
                error = %e,
                "Request failed"
            ),
            Failure::Service(ServiceError::App(e)) => tracing::warn!(
                request_id = %self.request_id,
                code = e.code(),
                error = %e,
                "Request rejected"
            ),
            Failure::Service(ServiceError::NotFound(id)) => tracing::debug!(
                request_id = %self.request_id,
                %id,
                "Analysis not found"
            ),
            Failure::NoRoute | Failure::MethodNotAllowed => tracing::debug!(
                request_id = %self.request_id,
                %status,
                "Unroutable request"
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        self.log(status);
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use clonescope_core::AppError;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_status_follows_taxonomy() {
        let err = ApiError::new(AppError::timeout("Analysis", Duration::from_secs(60)), "req-1", false);
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);

        let err = ApiError::new(AppError::rate_limit(Duration::from_secs(5)), "req-1", false);
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_details_hidden_in_production() {
        let app = AppError::validation("URL is required");

        let dev = ApiError::new(app.clone(), "req-1", true).body();
        assert_eq!(dev.details.as_deref(), Some("URL is required"));

        let prod = ApiError::new(app, "req-1", false).body();
        assert_eq!(prod.details, None);
        assert_eq!(prod.code, "VALIDATION_ERROR");
        assert_eq!(prod.request_id, "req-1");
    }

    #[test]
    fn test_not_found_body() {
        let err = ApiError::new(ServiceError::NotFound(Uuid::nil()), "", true);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let body = err.body();
        assert_eq!(body.code, NOT_FOUND_CODE);
        assert_eq!(body.request_id, UNKNOWN_REQUEST_ID);
    }

    #[test]
    fn test_routing_failures_share_the_body_shape() {
        let missing = ApiError::no_route("req-9");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let body = missing.body();
        assert_eq!(body.code, NOT_FOUND_CODE);
        assert_eq!(body.request_id, "req-9");

        let wrong_method = ApiError::method_not_allowed("");
        assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = wrong_method.body();
        assert_eq!(body.code, METHOD_NOT_ALLOWED_CODE);
        assert_eq!(body.request_id, UNKNOWN_REQUEST_ID);
        assert_eq!(body.details, None);
    }

    #[test]
    fn test_internal_errors_never_leak() {
        let err = ApiError::new(AppError::internal("db password is hunter2"), "req-1", true);
        let body = serde_json::to_value(err.body()).unwrap();
        assert!(!body.to_string().contains("hunter2"));
        assert_eq!(body["code"], "INTERNAL");
    }
}
