//! Request tagging and logging middleware.
//!
//! Both functions are installed with `axum::middleware::from_fn`.
//! `request_id_middleware` must wrap `logging_middleware` so the id is
//! already in the request extensions when logging starts.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::{HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use clonescope_core::UNKNOWN_REQUEST_ID;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Header carrying the request id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Request id stored in the request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn incoming_request_id(req: &Request) -> Option<String> {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
}

/// Forward the caller's `x-request-id` or mint a new one, and echo it on
/// the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = incoming_request_id(&req).unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Context captured before the request is handed to the next layer.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub request_id: String,
    pub start: Instant,
}

impl RequestContext {
    fn from_request(req: &Request) -> Self {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map_or_else(|| UNKNOWN_REQUEST_ID.to_string(), |id| id.0.clone());
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            request_id,
            start: Instant::now(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn log(&self, status: StatusCode) {
        let duration_ms = self.elapsed().as_millis();
        if status.is_server_error() {
            error!(
                method = %self.method,
                uri = %self.uri,
                request_id = %self.request_id,
                status = status.as_u16(),
                duration_ms,
                "Server error occurred"
            );
        } else if status.is_client_error() {
            warn!(
                method = %self.method,
                uri = %self.uri,
                request_id = %self.request_id,
                status = status.as_u16(),
                duration_ms,
                "Client error occurred"
            );
        } else {
            info!(
                method = %self.method,
                uri = %self.uri,
                request_id = %self.request_id,
                status = status.as_u16(),
                duration_ms,
                "Request completed"
            );
        }
    }
}

/// Log every request with method, uri, status and duration.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let ctx = RequestContext::from_request(&req);
    let response = next.run(req).await;
    ctx.log(response.status());
    response
}
