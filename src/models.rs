//! Wire types shared by the server and the interactive client.
//!
//! [`ApiResponse`] is the one shape every endpoint answers with. The server
//! renders it to HTTP; the client parses HTTP back into it and matches on the
//! variant instead of guessing at the body.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLicenseRequest {
    pub email: String,
    pub product: String,
}

/// Body of `POST /api/v1/invalidate` and `POST /api/v1/specific`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRequest {
    /// Base64 ciphertext of the license key.
    pub key: String,
}

/// Body of `POST /license/check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub key: String,
    pub product: String,
}

/// A license as exposed outside the server. `key` is always the encoded
/// ciphertext, never the plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicRecord {
    pub key: String,
    pub product: String,
    pub email: String,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LicenseList {
    pub licenses: Vec<PublicRecord>,
}

/// Business-level result of an action on a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Invalidated,
    AlreadyInvalid,
    Nonexistent,
    ProductMismatch,
    Valid,
    Invalid,
}

impl Outcome {
    /// Coarse status string carried on the wire.
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Invalidated => "invalidated",
            Outcome::Valid => "valid",
            Outcome::AlreadyInvalid
            | Outcome::Nonexistent
            | Outcome::ProductMismatch
            | Outcome::Invalid => "invalid",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Outcome::Created => "license created",
            Outcome::Invalidated => "license invalidated",
            Outcome::AlreadyInvalid => "license already invalid",
            Outcome::Nonexistent => "license nonexistent",
            Outcome::ProductMismatch => "incorrect product",
            Outcome::Valid => "license valid",
            Outcome::Invalid => "license invalid",
        }
    }

    /// HTTP status code. Every outcome is a handled result, so all are 2xx.
    pub fn code(&self) -> u16 {
        match self {
            Outcome::Created => 201,
            _ => 200,
        }
    }

    /// Recover the outcome from its wire status and message.
    pub fn from_wire(status: &str, message: &str) -> Option<Self> {
        [
            Outcome::Created,
            Outcome::Invalidated,
            Outcome::AlreadyInvalid,
            Outcome::Nonexistent,
            Outcome::ProductMismatch,
            Outcome::Valid,
            Outcome::Invalid,
        ]
        .into_iter()
        .find(|o| o.status() == status && o.message() == message)
    }
}

/// Response body for an action on a single license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeResponse {
    pub license_key: String,
    pub status: String,
    pub message: String,
    pub code: u16,
}

impl OutcomeResponse {
    pub fn new(license_key: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            license_key: license_key.into(),
            status: outcome.status().to_string(),
            message: outcome.message().to_string(),
            code: outcome.code(),
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        Outcome::from_wire(&self.status, &self.message)
    }
}

/// Response body for failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `"error"`.
    pub status: String,
    /// Machine-readable error code, e.g. `BAD_KEY`.
    #[serde(default)]
    pub error: String,
    pub message: String,
    pub code: u16,
}

/// Every response the API produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse {
    Record(PublicRecord),
    RecordList(LicenseList),
    Outcome(OutcomeResponse),
    Error(ErrorResponse),
}

impl ApiResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiResponse::Record(_) | ApiResponse::RecordList(_) => 200,
            ApiResponse::Outcome(o) => o.code,
            ApiResponse::Error(e) => e.code,
        }
    }
}

#[cfg(feature = "server")]
impl axum::response::IntoResponse for ApiResponse {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        use axum::Json;

        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self {
            ApiResponse::Record(r) => (status, Json(r)).into_response(),
            ApiResponse::RecordList(l) => (status, Json(l)).into_response(),
            ApiResponse::Outcome(o) => (status, Json(o)).into_response(),
            ApiResponse::Error(e) => (status, Json(e)).into_response(),
        }
    }
}
