//! Standardized API error responses.
//!
//! Every failure leaves the server as an [`ErrorResponse`](crate::models::ErrorResponse):
//!
//! ```json
//! {
//!   "status": "error",
//!   "error": "BAD_KEY",
//!   "message": "License key could not be decoded",
//!   "code": 400
//! }
//! ```
//!
//! Storage, configuration and secret failures are logged server-side and
//! reach the caller only as a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::LicenseError;
use crate::models::{ApiResponse, ErrorResponse};

/// Machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // === Validation Errors (400) ===
    /// Request payload is invalid or malformed
    InvalidRequest,
    /// A required field is missing
    MissingField,
    /// A field value is invalid
    InvalidField,
    /// Key material failed to decode or decrypt
    BadKey,

    // === Authentication Errors (401/429) ===
    /// Credentials missing or wrong
    Unauthorized,
    /// Per-client allowance exhausted
    RateLimited,

    // === Resource Errors (404/409) ===
    /// License key was not found
    LicenseNotFound,
    /// Requested route does not exist
    NotFound,
    /// Generated key collided with an existing one
    DuplicateKey,

    // === Server Errors (5xx) ===
    /// Database operation failed
    DatabaseError,
    /// Server configuration error
    ConfigError,
    /// Encryption with the server secret failed
    CryptoError,
    /// Unexpected internal server error
    InternalError,
}

impl ErrorCode {
    /// Returns the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest
            | ErrorCode::MissingField
            | ErrorCode::InvalidField
            | ErrorCode::BadKey => StatusCode::BAD_REQUEST,

            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            ErrorCode::LicenseNotFound | ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::DuplicateKey => StatusCode::CONFLICT,

            ErrorCode::DatabaseError
            | ErrorCode::ConfigError
            | ErrorCode::CryptoError
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "required parameters were not provided",
            ErrorCode::MissingField => "A required field is missing",
            ErrorCode::InvalidField => "A field value is invalid",
            ErrorCode::BadKey => "License key could not be decoded",
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::RateLimited => "you have reached your limit!",
            ErrorCode::LicenseNotFound => "license nonexistent",
            ErrorCode::NotFound => "404: not found",
            ErrorCode::DuplicateKey => "license already exists",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ConfigError => "Server configuration error",
            ErrorCode::CryptoError => "Encryption operation failed",
            ErrorCode::InternalError => "An unexpected error occurred",
        }
    }

    /// The code as it appears in the `error` field.
    pub fn as_str(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "INTERNAL_ERROR".to_string())
    }
}

/// An API failure: a code plus a caller-facing message.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    /// Uses the default message for the error code.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // === Convenience constructors for common errors ===

    pub fn invalid_request() -> Self {
        Self::new(ErrorCode::InvalidRequest)
    }

    pub fn invalid_field(field: &str, reason: &str) -> Self {
        Self::with_message(
            ErrorCode::InvalidField,
            format!("Invalid value for '{}': {}", field, reason),
        )
    }

    pub fn missing_field(field: &str) -> Self {
        Self::with_message(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn not_found() -> Self {
        Self::new(ErrorCode::NotFound)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized)
    }

    pub fn to_body(&self) -> ErrorResponse {
        ErrorResponse {
            status: "error".to_string(),
            error: self.code.as_str(),
            message: self.message.clone(),
            code: self.status_code().as_u16(),
        }
    }
}

impl From<ApiError> for ApiResponse {
    fn from(err: ApiError) -> Self {
        ApiResponse::Error(err.to_body())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ApiResponse::from(self).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<LicenseError> for ApiError {
    fn from(err: LicenseError) -> Self {
        match err {
            LicenseError::BadKey(_) | LicenseError::Encoding(_) => {
                ApiError::new(ErrorCode::BadKey)
            }
            LicenseError::NotFound => ApiError::new(ErrorCode::LicenseNotFound),
            LicenseError::DuplicateKey => ApiError::new(ErrorCode::DuplicateKey),
            LicenseError::AlreadyInvalid | LicenseError::ProductMismatch => {
                ApiError::with_message(ErrorCode::InvalidRequest, err.to_string())
            }
            LicenseError::Storage(msg) => {
                error!("Storage failure surfaced to API: {msg}");
                ApiError::new(ErrorCode::DatabaseError)
            }
            LicenseError::Crypto(msg) => {
                error!("Crypto failure with server secret: {msg}");
                ApiError::new(ErrorCode::CryptoError)
            }
            LicenseError::Config(msg) => {
                error!("Configuration failure surfaced to API: {msg}");
                ApiError::new(ErrorCode::ConfigError)
            }
            LicenseError::Network(e) => {
                error!("Unexpected network error in server: {e}");
                ApiError::new(ErrorCode::InternalError)
            }
            LicenseError::Server(msg) => {
                error!("Unexpected server error: {msg}");
                ApiError::new(ErrorCode::InternalError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_status_mapping() {
        assert_eq!(ErrorCode::BadKey.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ErrorCode::LicenseNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ErrorCode::DuplicateKey.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::DatabaseError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_body_shape() {
        let body = ApiError::new(ErrorCode::BadKey).to_body();
        assert_eq!(body.status, "error");
        assert_eq!(body.error, "BAD_KEY");
        assert_eq!(body.code, 400);
    }

    #[test]
    fn storage_detail_is_hidden() {
        let api_err: ApiError = LicenseError::Storage("connection refused at 10.0.0.3".into()).into();
        assert_eq!(api_err.code, ErrorCode::DatabaseError);
        assert!(!api_err.message.contains("10.0.0.3"));
    }

    #[test]
    fn license_error_conversion() {
        let api_err: ApiError = LicenseError::BadKey("bad base64".to_string()).into();
        assert_eq!(api_err.code, ErrorCode::BadKey);

        let api_err: ApiError = LicenseError::NotFound.into();
        assert_eq!(api_err.status_code(), StatusCode::NOT_FOUND);
    }
}
