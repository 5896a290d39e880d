//! Configuration system for Keystead.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `keystead.toml` file (or an explicit path)
//! 3. Default values (lowest priority)
//!
//! The result is an owned [`KeysteadConfig`]. It is loaded once at startup and
//! passed by reference to whatever needs it; nothing in the crate reads
//! configuration from ambient global state.
//!
//! # Environment Variables
//!
//! - `KEYSTEAD_SERVER_HOST` - Server bind address
//! - `KEYSTEAD_SERVER_PORT` - Server port
//! - `KEYSTEAD_SERVER_PRODUCTION` - Production mode (`true`/`false`)
//! - `KEYSTEAD_DATABASE_TYPE` - `sqlite` or `postgres`
//! - `KEYSTEAD_DATABASE_URL` - Database connection URL
//! - `KEYSTEAD_CRYPT_SECRET` - Hex-encoded 32-byte encryption secret
//! - `KEYSTEAD_AUTH_ACCOUNTS` - Basic auth accounts, `user:pass,user2:pass2`
//! - `KEYSTEAD_RATE_LIMIT_ENABLED` - Enable rate limiting on `/license/check`
//! - `KEYSTEAD_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//! - `KEYSTEAD_CLIENT_BASE_URL` - Base URL the interactive client talks to
//! - `KEYSTEAD_CLIENT_USERNAME` / `KEYSTEAD_CLIENT_PASSWORD` - Client credentials

use std::collections::HashMap;
use std::env;

use config::{Config, ConfigBuilder};
use serde::Deserialize;

use crate::encryption::KEY_SIZE;
use crate::errors::{LicenseError, LicenseResult};

/// Default config file name (without extension).
pub const DEFAULT_CONFIG_NAME: &str = "keystead";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeysteadConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub crypto: CryptoConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
    pub client: ClientConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Production mode trims log verbosity defaults
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            production: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    /// SQLite connection URL
    pub sqlite_url: String,
    /// PostgreSQL connection URL
    pub postgres_url: String,
    /// Maximum pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://keystead.db?mode=rwc".to_string(),
            postgres_url: "postgres://localhost/keystead".to_string(),
            max_connections: 5,
        }
    }
}

/// Key encryption configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Hex-encoded AES-256 secret (use `env:VAR_NAME` to read from environment)
    pub secret: String,
}

impl CryptoConfig {
    /// Resolve and decode the secret into raw key bytes.
    pub fn secret_bytes(&self) -> LicenseResult<Vec<u8>> {
        let raw = match self.secret.strip_prefix("env:") {
            Some(var) => env::var(var).map_err(|_| {
                LicenseError::Config(format!("crypto.secret refers to unset variable {var}"))
            })?,
            None => self.secret.clone(),
        };

        if raw.is_empty() {
            return Err(LicenseError::Config(
                "crypto.secret is required (run `keystead_server secret generate`)".to_string(),
            ));
        }

        let bytes = hex::decode(raw.trim())
            .map_err(|e| LicenseError::Config(format!("crypto.secret is not valid hex: {e}")))?;

        if bytes.len() != KEY_SIZE {
            return Err(LicenseError::Config(format!(
                "crypto.secret must decode to {KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(bytes)
    }
}

/// Basic authentication accounts for the admin endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// username -> password
    pub accounts: HashMap<String, String>,
}

/// Rate limiting for the public check endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests a single client address may make in a burst
    pub check_burst: u32,
    /// Seconds between replenishing one request of allowance
    pub replenish_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_burst: 10,
            replenish_interval_secs: 60,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Settings for the interactive client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            username: "username".to_string(),
            password: "password".to_string(),
        }
    }
}

fn config_err(e: config::ConfigError) -> LicenseError {
    LicenseError::Config(e.to_string())
}

/// Parse `user:pass,user2:pass2` into an accounts map.
///
/// Entries without a `:` are skipped.
pub fn parse_accounts(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|entry| {
            let (user, pass) = entry.trim().split_once(':')?;
            if user.is_empty() {
                return None;
            }
            Some((user.to_string(), pass.to_string()))
        })
        .collect()
}

impl KeysteadConfig {
    /// Load configuration from `keystead.toml` (optional) and environment.
    pub fn load() -> LicenseResult<Self> {
        Self::load_from(None)
    }

    /// Load configuration, reading `path` instead of the default file name.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load_from(path: Option<&str>) -> LicenseResult<Self> {
        let file = match path {
            Some(p) => config::File::with_name(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let builder = Self::defaults()?.add_source(file);
        let builder = Self::env_overrides(builder)?;

        let settings = builder
            .build()
            .map_err(|e| LicenseError::Config(format!("failed to build config: {e}")))?;

        let mut config: KeysteadConfig = settings
            .try_deserialize()
            .map_err(|e| LicenseError::Config(format!("failed to deserialize config: {e}")))?;

        // Maps don't fit set_override_option, so the accounts override is applied here.
        if let Ok(accounts) = env::var("KEYSTEAD_AUTH_ACCOUNTS") {
            config.auth.accounts = parse_accounts(&accounts);
        }

        Ok(config)
    }

    fn defaults() -> LicenseResult<ConfigBuilder<config::builder::DefaultState>> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")
            .map_err(config_err)?
            .set_default("server.port", 8080)
            .map_err(config_err)?
            .set_default("server.production", false)
            .map_err(config_err)?
            .set_default("database.db_type", "sqlite")
            .map_err(config_err)?
            .set_default("database.sqlite_url", "sqlite://keystead.db?mode=rwc")
            .map_err(config_err)?
            .set_default("database.postgres_url", "postgres://localhost/keystead")
            .map_err(config_err)?
            .set_default("database.max_connections", 5)
            .map_err(config_err)?
            .set_default("crypto.secret", "")
            .map_err(config_err)?
            .set_default("rate_limit.enabled", true)
            .map_err(config_err)?
            .set_default("rate_limit.check_burst", 10)
            .map_err(config_err)?
            .set_default("rate_limit.replenish_interval_secs", 60)
            .map_err(config_err)?
            .set_default("logging.level", "info")
            .map_err(config_err)?
            .set_default("client.base_url", "http://localhost:8080")
            .map_err(config_err)?
            .set_default("client.username", "username")
            .map_err(config_err)?
            .set_default("client.password", "password")
            .map_err(config_err)
    }

    fn env_overrides(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> LicenseResult<ConfigBuilder<config::builder::DefaultState>> {
        builder
            .set_override_option("server.host", env::var("KEYSTEAD_SERVER_HOST").ok())
            .map_err(config_err)?
            .set_override_option(
                "server.port",
                env::var("KEYSTEAD_SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(config_err)?
            .set_override_option(
                "server.production",
                env::var("KEYSTEAD_SERVER_PRODUCTION")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(config_err)?
            .set_override_option("database.db_type", env::var("KEYSTEAD_DATABASE_TYPE").ok())
            .map_err(config_err)?
            .set_override_option(
                "database.sqlite_url",
                env::var("KEYSTEAD_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("sqlite")),
            )
            .map_err(config_err)?
            .set_override_option(
                "database.postgres_url",
                env::var("KEYSTEAD_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("postgres")),
            )
            .map_err(config_err)?
            .set_override_option("crypto.secret", env::var("KEYSTEAD_CRYPT_SECRET").ok())
            .map_err(config_err)?
            .set_override_option(
                "rate_limit.enabled",
                env::var("KEYSTEAD_RATE_LIMIT_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(config_err)?
            .set_override_option("logging.level", env::var("KEYSTEAD_LOG_LEVEL").ok())
            .map_err(config_err)?
            .set_override_option("client.base_url", env::var("KEYSTEAD_CLIENT_BASE_URL").ok())
            .map_err(config_err)?
            .set_override_option("client.username", env::var("KEYSTEAD_CLIENT_USERNAME").ok())
            .map_err(config_err)?
            .set_override_option("client.password", env::var("KEYSTEAD_CLIENT_PASSWORD").ok())
            .map_err(config_err)
    }

    /// Validate the settings the server needs.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.server.port == 0 {
            return Err(LicenseError::Config(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(LicenseError::Config(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        if self.database.max_connections == 0 {
            return Err(LicenseError::Config(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        self.crypto.secret_bytes()?;

        if self.auth.accounts.is_empty() {
            return Err(LicenseError::Config(
                "auth.accounts must contain at least one account".to_string(),
            ));
        }

        if self.rate_limit.enabled
            && (self.rate_limit.check_burst == 0 || self.rate_limit.replenish_interval_secs == 0)
        {
            return Err(LicenseError::Config(
                "rate_limit.check_burst and rate_limit.replenish_interval_secs must be greater than 0"
                    .to_string(),
            ));
        }

        self.log_level()?;

        Ok(())
    }

    /// The configured log level as a `tracing` level.
    pub fn log_level(&self) -> LicenseResult<tracing::Level> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            other => Err(LicenseError::Config(format!(
                "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
            ))),
        }
    }
}
