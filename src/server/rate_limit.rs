//! Rate limiting for the public license check endpoint.
//!
//! Each client address gets a fixed allowance (`check_burst` requests) that
//! refills by one request every `replenish_interval_secs`.
//!
//! # Configuration
//!
//! ```toml
//! [rate_limit]
//! enabled = true
//! check_burst = 10              # requests allowed in a burst
//! replenish_interval_secs = 60  # one request restored per minute
//! ```
//!
//! # Important
//!
//! `SmartIpKeyExtractor` reads `X-Forwarded-For`, `X-Real-IP` and `Forwarded`
//! before falling back to the peer address, so the server must be started
//! with `.into_make_service_with_connect_info::<SocketAddr>()`.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use governor::middleware::NoOpMiddleware;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;

pub use tower_governor::key_extractor::SmartIpKeyExtractor;
pub use tower_governor::GovernorLayer;

use crate::config::RateLimitConfig;
use crate::errors::{LicenseError, LicenseResult};
use crate::server::api_error::{ApiError, ErrorCode};

/// Create the per-IP limiter for `/license/check`.
pub fn create_rate_limiter(
    config: &RateLimitConfig,
) -> LicenseResult<GovernorLayer<SmartIpKeyExtractor, NoOpMiddleware>> {
    let interval_ms = config.replenish_interval_secs.saturating_mul(1000).max(1);

    let governor_config = GovernorConfigBuilder::default()
        .per_millisecond(interval_ms)
        .burst_size(config.check_burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .ok_or_else(|| {
            LicenseError::Config(
                "rate_limit.check_burst and rate_limit.replenish_interval_secs must be non-zero"
                    .to_string(),
            )
        })?;

    Ok(GovernorLayer {
        config: Arc::new(governor_config),
    })
}

/// JSON 429 body with a `Retry-After` header.
pub fn rate_limit_error_response(retry_after_secs: u64) -> Response<Body> {
    let retry_after = retry_after_secs.max(1);
    let body = ApiError::new(ErrorCode::RateLimited).to_body();

    let mut response = Response::new(Body::from(
        serde_json::to_string(&body).unwrap_or_default(),
    ));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    if let Ok(value) = header::HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

/// Rewrites the limiter's plain-text 429 into the API's JSON error body.
///
/// Applied as `map_response` outside the governor layer; any other response
/// passes through untouched.
pub async fn rate_limit_json_response(response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    let retry_after = ["retry-after", "x-ratelimit-after"]
        .iter()
        .find_map(|name| {
            response
                .headers()
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        })
        .unwrap_or(1);

    rate_limit_error_response(retry_after)
}
