//! HTTP Basic authentication for the admin endpoints.
//!
//! The accounts come from `auth.accounts` in the configuration. The check
//! runs as middleware, so handlers behind it assume an authorized caller.
//!
//! # Usage
//!
//! ```rust,ignore
//! use axum::middleware;
//! use keystead::server::auth::{require_basic_auth, BasicAuth};
//!
//! let auth = BasicAuth::from_config(&config.auth);
//! let admin = Router::new()
//!     .route("/create", post(create_license_handler))
//!     .route_layer(middleware::from_fn_with_state(auth, require_basic_auth));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use ring::constant_time::verify_slices_are_equal;
use tracing::warn;

use crate::config::AuthConfig;
use crate::server::api_error::ApiError;

/// Realm advertised in `WWW-Authenticate`.
pub const AUTH_REALM: &str = "keystead";

/// Configured Basic auth accounts.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    accounts: Arc<HashMap<String, String>>,
}

impl BasicAuth {
    pub fn new(accounts: HashMap<String, String>) -> Self {
        Self {
            accounts: Arc::new(accounts),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.accounts.clone())
    }

    /// Check a username/password pair against the configured accounts.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self.accounts.get(username) {
            Some(expected) => {
                verify_slices_are_equal(expected.as_bytes(), password.as_bytes()).is_ok()
            }
            None => false,
        }
    }

    /// Check a raw `Authorization` header value.
    pub fn verify_header(&self, header_value: &str) -> bool {
        parse_basic_auth(header_value)
            .map(|(user, pass)| self.verify(&user, &pass))
            .unwrap_or(false)
    }
}

/// Parse `Basic <base64(user:pass)>` into its parts.
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = B64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;

    Some((user.to_string(), pass.to_string()))
}

/// Middleware rejecting requests without valid Basic credentials.
pub async fn require_basic_auth(
    State(auth): State<BasicAuth>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| auth.verify_header(v))
        .unwrap_or(false);

    if authorized {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Rejected request with missing or bad credentials");

    let mut response = ApiError::unauthorized().into_response();
    if let Ok(challenge) = HeaderValue::from_str(&format!("Basic realm=\"{AUTH_REALM}\"")) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, challenge);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> BasicAuth {
        let mut accounts = HashMap::new();
        accounts.insert("admin".to_string(), "hunter2".to_string());
        BasicAuth::new(accounts)
    }

    fn header_for(user: &str, pass: &str) -> String {
        format!("Basic {}", B64.encode(format!("{user}:{pass}")))
    }

    #[test]
    fn parses_basic_header() {
        let parsed = parse_basic_auth(&header_for("admin", "pa:ss"));
        assert_eq!(parsed, Some(("admin".to_string(), "pa:ss".to_string())));
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert!(parse_basic_auth("Bearer abc").is_none());
        assert!(parse_basic_auth("Basic !!!").is_none());
        assert!(parse_basic_auth("Basic").is_none());
        assert!(parse_basic_auth(&format!("Basic {}", B64.encode("nocolon"))).is_none());
    }

    #[test]
    fn verifies_configured_account() {
        let auth = auth();
        assert!(auth.verify_header(&header_for("admin", "hunter2")));
        assert!(!auth.verify_header(&header_for("admin", "hunter3")));
        assert!(!auth.verify_header(&header_for("root", "hunter2")));
        assert!(!auth.verify("admin", ""));
    }
}
