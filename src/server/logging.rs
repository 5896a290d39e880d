//! Request tracing and license audit events.
//!
//! Every request runs inside a `request` span carrying a request id, which is
//! returned in `X-Request-Id`. A caller-supplied id is kept when it is a
//! UUID, so a client can correlate its own logs with the server's.
//!
//! Audit events name a license only by
//! [`key_fingerprint`](crate::license_key::key_fingerprint).

use std::time::Instant;

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderValue, Response},
    middleware::Next,
};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Something that happened to a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseEvent {
    Created,
    Invalidated,
    /// Already invalid, or no such license.
    InvalidationRejected,
    /// A public check answered `valid`.
    Validated,
    /// A public check answered anything else.
    ValidationFailed,
}

impl LicenseEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseEvent::Created => "created",
            LicenseEvent::Invalidated => "invalidated",
            LicenseEvent::InvalidationRejected => "invalidation_rejected",
            LicenseEvent::Validated => "validated",
            LicenseEvent::ValidationFailed => "validation_failed",
        }
    }

    /// Refusals are logged at WARN, everything else at INFO.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            LicenseEvent::InvalidationRejected | LicenseEvent::ValidationFailed
        )
    }
}

impl std::fmt::Display for LicenseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emit one audit line for `event` on the license with `fingerprint`.
///
/// `detail` is the product for successes and the reason for refusals.
pub fn log_license_event(event: LicenseEvent, fingerprint: &str, detail: Option<&str>) {
    let detail = detail.unwrap_or("-");
    if event.is_refusal() {
        warn!(event = %event, key_fp = %fingerprint, reason = %detail, "license {event}");
    } else {
        info!(event = %event, key_fp = %fingerprint, detail = %detail, "license {event}");
    }
}

/// The caller's `X-Request-Id` if it is a UUID, else a fresh one.
pub fn request_id_from(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .unwrap_or_else(Uuid::new_v4)
        .to_string()
}

/// Wrap each request in a `request` span and log its status and latency.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response<Body> {
    let request_id = request_id_from(request.headers());
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    span.in_scope(|| {
        if response.status().is_server_error() {
            warn!(status, latency_ms, "request failed");
        } else {
            info!(status, latency_ms, "request served");
        }
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::Request as HttpRequest, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(request_logging_middleware))
    }

    #[test]
    fn refusals_are_flagged() {
        assert!(LicenseEvent::ValidationFailed.is_refusal());
        assert!(LicenseEvent::InvalidationRejected.is_refusal());
        assert!(!LicenseEvent::Created.is_refusal());
        assert_eq!(LicenseEvent::InvalidationRejected.to_string(), "invalidation_rejected");
    }

    #[test]
    fn foreign_request_ids_are_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        let id = request_id_from(&headers);
        assert_ne!(id, "not-a-uuid");
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn response_carries_request_id() {
        let response = app()
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn caller_request_id_is_echoed() {
        let id = Uuid::new_v4().to_string();
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, &id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], id.as_str());
    }
}
