//! Request validation utilities.
//!
//! These run in the handlers before any request reaches the service layer.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::server::api_error::ApiError;

/// Upper bound for product names and emails.
pub const MAX_FIELD_LENGTH: usize = 255;

/// Upper bound for encoded keys. A real key encodes to well under this.
pub const MAX_ENCODED_KEY_LENGTH: usize = 512;

/// Validation error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    /// The field was absent or blank rather than malformed.
    pub missing: bool,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        if err.missing {
            ApiError::missing_field(&err.field)
        } else {
            ApiError::invalid_field(&err.field, &err.message)
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn invalid(field_name: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field_name.to_string(),
        message: message.into(),
        missing: false,
    }
}

/// Validate that a string is not empty or whitespace only.
///
/// # Example
/// ```
/// use keystead::server::validation::validate_not_empty;
///
/// assert!(validate_not_empty("hello", "name").is_ok());
/// assert!(validate_not_empty("", "name").is_err());
/// assert!(validate_not_empty("   ", "name").is_err());
/// ```
pub fn validate_not_empty(value: &str, field_name: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "must not be empty".to_string(),
            missing: true,
        })
    } else {
        Ok(())
    }
}

/// Validate string length is within bounds.
pub fn validate_length(value: &str, field_name: &str, max: usize) -> ValidationResult<()> {
    if value.len() > max {
        Err(invalid(field_name, format!("must be at most {max} characters")))
    } else {
        Ok(())
    }
}

/// Validate a product name: non-empty, bounded, no path separators.
pub fn validate_product(value: &str, field_name: &str) -> ValidationResult<()> {
    validate_not_empty(value, field_name)?;
    validate_length(value, field_name, MAX_FIELD_LENGTH)?;
    if value.contains('/') {
        return Err(invalid(field_name, "must not contain '/'"));
    }
    Ok(())
}

/// Validate an email address shape (`local@domain.tld`).
///
/// # Example
/// ```
/// use keystead::server::validation::validate_email;
///
/// assert!(validate_email("a@x.com", "email").is_ok());
/// assert!(validate_email("not-an-email", "email").is_err());
/// ```
pub fn validate_email(value: &str, field_name: &str) -> ValidationResult<()> {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

    validate_not_empty(value, field_name)?;
    validate_length(value, field_name, MAX_FIELD_LENGTH)?;

    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
    });

    if re.is_match(value) {
        Ok(())
    } else {
        Err(invalid(field_name, "invalid email address"))
    }
}

/// Validate an encoded key: non-empty and bounded. Decoding is left to the
/// service so that decode failures keep their own handling.
pub fn validate_encoded_key(value: &str, field_name: &str) -> ValidationResult<()> {
    validate_not_empty(value, field_name)?;
    validate_length(value, field_name, MAX_ENCODED_KEY_LENGTH)
}
