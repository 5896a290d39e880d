//! Keystead - a license key server
//!
//! Issues opaque license keys for products, hands them out only as
//! AES-256-GCM ciphertext, and answers validity checks against a product.
//!
//! # Features
//!
//! - `server` - Server components (store, service, HTTP handlers). Enabled by default.
//! - `sqlite` - SQLite database backend. Enabled by default.
//! - `postgres` - PostgreSQL database backend.
//!
//! # Example
//!
//! ```toml
//! # Use defaults (server + sqlite)
//! keystead = "0.1"
//!
//! # Client-only (no server components)
//! keystead = { version = "0.1", default-features = false }
//!
//! # Server with PostgreSQL
//! keystead = { version = "0.1", features = ["server", "postgres"] }
//! ```

// Core modules (always available)
pub mod config;
pub mod encryption;
pub mod errors;
pub mod license_key;
pub mod models;

// Client-related modules (always available)
pub mod client {
    pub mod api;
    pub mod prompt;

    pub use api::LicenseApiClient;
}

// Server-related modules (requires "server" feature)
#[cfg(feature = "server")]
#[path = "server/mod.rs"]
pub mod server;
