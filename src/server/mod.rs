//! Server-side components for Keystead.
//!
//! This module contains:
//! - `database`    → license store over SQLite/Postgres
//! - `service`     → license lifecycle on top of the store and key codec
//! - `handlers`    → Axum HTTP handlers for license endpoints
//! - `routes`      → Router builder
//! - `auth`        → HTTP Basic authentication middleware
//! - `rate_limit`  → Per-IP rate limiting for the public check endpoint
//! - `api_error`   → Standardized error responses
//! - `validation`  → Request validation utilities
//! - `logging`     → Request logging and license audit events
//! - `bootstrap`   → Server startup and command line

pub mod api_error;
pub mod auth;
pub mod bootstrap;
pub mod database;
pub mod handlers;
pub mod logging;
pub mod rate_limit;
pub mod routes;
pub mod service;
pub mod validation;

pub use api_error::{ApiError, ErrorCode};
pub use auth::{require_basic_auth, BasicAuth};
pub use bootstrap::{build_app, init_tracing, parse_server_command, run_server, ServerCommand};
pub use database::{Database, KeyStatus, LicenseRecord, ProductValidity};
pub use handlers::AppState;
pub use rate_limit::{create_rate_limiter, rate_limit_error_response, SmartIpKeyExtractor};
pub use routes::build_router;
pub use service::LicenseService;
pub use validation::{ValidationError, ValidationResult};
