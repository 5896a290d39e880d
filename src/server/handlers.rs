//! HTTP handlers for the license endpoints.
//!
//! Handlers validate the request shape, call [`LicenseService`] and render
//! the result as an [`ApiResponse`]. Business outcomes (already invalid,
//! nonexistent, wrong product) are 2xx responses; only malformed input,
//! undecodable keys and internal failures become errors.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::LicenseError;
use crate::models::{
    ApiResponse, CheckRequest, CreateLicenseRequest, KeyRequest, LicenseList, Outcome,
    OutcomeResponse,
};
use crate::server::api_error::ApiError;
use crate::server::service::LicenseService;
use crate::server::validation::{
    validate_email, validate_encoded_key, validate_not_empty, validate_product,
};

/// Shared application state for handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: LicenseService,
}

impl AppState {
    pub fn new(service: LicenseService) -> Self {
        Self { service }
    }
}

type HandlerResult = Result<ApiResponse, ApiError>;

/// Unwrap a JSON body, turning any rejection into `INVALID_REQUEST`.
fn parse_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        debug!("Rejected request body: {rejection}");
        ApiError::invalid_request()
    })
}

#[derive(Debug, Serialize)]
struct Banner {
    message: &'static str,
}

/// `GET /`
pub async fn index_handler() -> impl IntoResponse {
    Json(Banner {
        message: "keystead licensing server",
    })
}

#[derive(Debug, Serialize)]
struct DatabaseHealth {
    connected: bool,
    db_type: &'static str,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    database: DatabaseHealth,
}

impl Health {
    fn new(connected: bool, db_type: &'static str) -> Self {
        Self {
            status: if connected { "healthy" } else { "degraded" },
            service: "keystead",
            version: env!("CARGO_PKG_VERSION"),
            database: DatabaseHealth { connected, db_type },
        }
    }
}

/// `GET /health`
///
/// 200 when the database answers, 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db = state.service.database();
    let connected = db.ping().await;
    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(Health::new(connected, db.db_type())))
}

/// `POST /api/v1/create`
pub async fn create_license_handler(
    State(state): State<AppState>,
    body: Result<Json<CreateLicenseRequest>, JsonRejection>,
) -> HandlerResult {
    let req = parse_json(body)?;
    validate_email(&req.email, "email")?;
    validate_product(&req.product, "product")?;

    let encoded = state.service.create(&req.product, &req.email).await?;
    info!(product = %req.product, "License issued");

    Ok(ApiResponse::Outcome(OutcomeResponse::new(
        encoded,
        Outcome::Created,
    )))
}

/// `POST /api/v1/invalidate`
pub async fn invalidate_license_handler(
    State(state): State<AppState>,
    body: Result<Json<KeyRequest>, JsonRejection>,
) -> HandlerResult {
    let req = parse_json(body)?;
    validate_encoded_key(&req.key, "key")?;

    let outcome = state.service.invalidate(&req.key).await?;
    Ok(ApiResponse::Outcome(OutcomeResponse::new(req.key, outcome)))
}

/// `POST /api/v1/specific`
///
/// An unknown key is answered with the `nonexistent` outcome rather than 404.
pub async fn get_license_handler(
    State(state): State<AppState>,
    body: Result<Json<KeyRequest>, JsonRejection>,
) -> HandlerResult {
    let req = parse_json(body)?;
    validate_encoded_key(&req.key, "key")?;

    match state.service.get_one(&req.key).await {
        Ok(record) => Ok(ApiResponse::Record(record)),
        Err(LicenseError::NotFound) => Ok(ApiResponse::Outcome(OutcomeResponse::new(
            req.key,
            Outcome::Nonexistent,
        ))),
        Err(e) => Err(e.into()),
    }
}

/// `GET /api/v1/all/:product`
pub async fn list_licenses_handler(
    State(state): State<AppState>,
    Path(product): Path<String>,
) -> HandlerResult {
    validate_product(&product, "product")?;

    let licenses = state.service.get_all(&product).await?;
    Ok(ApiResponse::RecordList(LicenseList { licenses }))
}

/// `POST /license/check`
///
/// Public and rate limited. Keys that fail to decode are reported as
/// `invalid` with no further detail.
pub async fn check_license_handler(
    State(state): State<AppState>,
    body: Result<Json<CheckRequest>, JsonRejection>,
) -> HandlerResult {
    let req = parse_json(body)?;
    validate_not_empty(&req.key, "key")?;
    validate_not_empty(&req.product, "product")?;

    let outcome = state.service.check_validity(&req.key, &req.product).await?;
    Ok(ApiResponse::Outcome(OutcomeResponse::new(req.key, outcome)))
}

/// Fallback for unknown routes.
pub async fn not_found_handler() -> ApiError {
    ApiError::not_found()
}
