use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::config::RateLimitConfig;
use crate::errors::LicenseResult;
use crate::server::auth::{require_basic_auth, BasicAuth};
use crate::server::handlers::{
    check_license_handler, create_license_handler, get_license_handler, health_handler,
    index_handler, invalidate_license_handler, list_licenses_handler, not_found_handler,
    AppState,
};
use crate::server::logging::request_logging_middleware;
use crate::server::rate_limit::{create_rate_limiter, rate_limit_json_response};

/// Build the application router for the Keystead server.
///
/// # Routes
///
/// ## Public
/// - `GET /` - Banner
/// - `GET /health` - Service and database status
/// - `POST /license/check` - Check a key against a product (rate limited per client address)
///
/// ## Basic auth
/// - `POST /api/v1/create` - Issue a license
/// - `POST /api/v1/invalidate` - Invalidate a license
/// - `POST /api/v1/specific` - Fetch one license
/// - `GET /api/v1/all/:product` - List valid licenses for a product
///
/// Anything else gets a JSON 404.
///
/// The rate limiter needs the peer address, so serve the router with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_router(
    state: AppState,
    auth: BasicAuth,
    rate_limit: &RateLimitConfig,
) -> LicenseResult<Router> {
    let admin = Router::new()
        .route("/create", post(create_license_handler))
        .route("/invalidate", post(invalidate_license_handler))
        .route("/specific", post(get_license_handler))
        .route("/all/:product", get(list_licenses_handler))
        .route_layer(middleware::from_fn_with_state(auth, require_basic_auth));

    let mut check = Router::new().route("/license/check", post(check_license_handler));
    if rate_limit.enabled {
        check = check
            .layer(create_rate_limiter(rate_limit)?)
            .layer(middleware::map_response(rate_limit_json_response));
    }

    let router = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .nest("/api/v1", admin)
        .merge(check)
        .fallback(not_found_handler)
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state);

    Ok(router)
}
