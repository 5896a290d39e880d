//! Error types shared by the store, the service layer and the client.
//!
//! Business outcomes such as "not found" or "already invalid" are error
//! variants here, but the service layer turns most of them into
//! [`Outcome`](crate::models::Outcome) values before they reach HTTP.

use thiserror::Error;

/// Result alias used across the crate.
pub type LicenseResult<T> = Result<T, LicenseError>;

#[derive(Debug, Error)]
pub enum LicenseError {
    /// Transport text was not valid base64.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Encryption or decryption failed, or the secret is malformed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Inbound key material could not be decoded or decrypted.
    #[error("bad license key: {0}")]
    BadKey(String),

    /// A freshly generated key collided with a stored one.
    #[error("license already exists")]
    DuplicateKey,

    #[error("license nonexistent")]
    NotFound,

    #[error("license already invalid")]
    AlreadyInvalid,

    #[error("incorrect product")]
    ProductMismatch,

    /// Underlying store failure (connectivity, constraint, decode).
    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Unexpected response from the license server.
    #[error("server error: {0}")]
    Server(String),
}
