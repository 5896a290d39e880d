//! License store over SQLite or PostgreSQL.
//!
//! All lookups are by plaintext key. The plaintext never leaves this module
//! and [`crate::server::service`]; anything returned to callers outside the
//! server is re-encoded first.

use std::sync::Arc;

use sqlx::FromRow;
use tracing::{error, info};

#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[cfg(feature = "postgres")]
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::errors::{LicenseError, LicenseResult};

/// A row of the `licenses` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct LicenseRecord {
    pub id: i64,
    pub license_key: String,
    pub product: String,
    pub email: String,
    pub valid: bool,
}

/// Existence and validity of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Missing,
    Valid,
    Invalid,
}

impl KeyStatus {
    pub fn exists(&self) -> bool {
        !matches!(self, KeyStatus::Missing)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, KeyStatus::Valid)
    }

    fn from_row(valid: Option<bool>) -> Self {
        match valid {
            None => KeyStatus::Missing,
            Some(true) => KeyStatus::Valid,
            Some(false) => KeyStatus::Invalid,
        }
    }
}

/// Result of checking a key against a specific product.
///
/// An invalidated license reports `Invalid` whatever product was asked for;
/// `ProductMismatch` means the license exists and is valid, but for another
/// product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductValidity {
    NotFound,
    Invalid,
    ProductMismatch,
    Valid,
}

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

fn storage_error(op: &'static str) -> impl FnOnce(sqlx::Error) -> LicenseError {
    move |e| {
        error!("{op} failed: {e}");
        LicenseError::Storage(format!("{op}: {e}"))
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(feature = "sqlite")]
const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS licenses (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        license_key TEXT    NOT NULL UNIQUE,
        product     TEXT    NOT NULL,
        email       TEXT    NOT NULL,
        valid       BOOLEAN NOT NULL DEFAULT 1
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_licenses_product_valid ON licenses (product, valid)",
];

#[cfg(feature = "postgres")]
const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS licenses (
        id          BIGSERIAL PRIMARY KEY,
        license_key TEXT      NOT NULL UNIQUE,
        product     TEXT      NOT NULL,
        email       TEXT      NOT NULL,
        valid       BOOLEAN   NOT NULL DEFAULT TRUE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_licenses_product_valid ON licenses (product, valid)",
];

impl Database {
    /// Connect using the database section of the configuration.
    pub async fn connect(config: &DatabaseConfig) -> LicenseResult<Arc<Self>> {
        match config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.sqlite_url)
                    .await
                    .map_err(storage_error("connect to SQLite"))?;
                Ok(Arc::new(Database::SQLite(pool)))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(LicenseError::Config(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.postgres_url)
                    .await
                    .map_err(storage_error("connect to PostgreSQL"))?;
                Ok(Arc::new(Database::Postgres(pool)))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(LicenseError::Config(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(LicenseError::Config(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Create the `licenses` table and its index if they are missing.
    pub async fn run_migrations(&self) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                for statement in SQLITE_SCHEMA {
                    sqlx::query(statement)
                        .execute(pool)
                        .await
                        .map_err(storage_error("run migrations"))?;
                }
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                for statement in POSTGRES_SCHEMA {
                    sqlx::query(statement)
                        .execute(pool)
                        .await
                        .map_err(storage_error("run migrations"))?;
                }
            }
        }
        info!("Database schema ready ({})", self.db_type());
        Ok(())
    }

    pub fn db_type(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }

    /// Round-trip a trivial query; false if the store is unreachable.
    pub async fn ping(&self) -> bool {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        };
        result.is_ok()
    }

    /// Whether a license with this plaintext key exists.
    pub async fn license_exists(&self, key: &str) -> LicenseResult<bool> {
        Ok(self.check_valid(key).await?.exists())
    }

    /// Existence and validity of a key in a single lookup.
    pub async fn check_valid(&self, key: &str) -> LicenseResult<KeyStatus> {
        let valid: Option<bool> = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query_scalar("SELECT valid FROM licenses WHERE license_key = ?")
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(storage_error("check_valid"))?
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query_scalar("SELECT valid FROM licenses WHERE license_key = $1")
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(storage_error("check_valid"))?
            }
        };

        Ok(KeyStatus::from_row(valid))
    }

    /// Check a key against a product. Validity dominates product mismatch.
    pub async fn check_valid_for_product(
        &self,
        key: &str,
        product: &str,
    ) -> LicenseResult<ProductValidity> {
        let row = self.find_license(key).await?;

        Ok(match row {
            None => ProductValidity::NotFound,
            Some(license) if !license.valid => ProductValidity::Invalid,
            Some(license) if license.product != product => ProductValidity::ProductMismatch,
            Some(_) => ProductValidity::Valid,
        })
    }

    /// Fetch the whole record for a key, failing with `NotFound` if absent.
    pub async fn get_license(&self, key: &str) -> LicenseResult<LicenseRecord> {
        self.find_license(key).await?.ok_or(LicenseError::NotFound)
    }

    async fn find_license(&self, key: &str) -> LicenseResult<Option<LicenseRecord>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => sqlx::query_as::<_, LicenseRecord>(
                "SELECT id, license_key, product, email, valid FROM licenses WHERE license_key = ?",
            )
            .bind(key)
            .fetch_optional(pool)
            .await
            .map_err(storage_error("get_license")),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => sqlx::query_as::<_, LicenseRecord>(
                "SELECT id, license_key, product, email, valid FROM licenses WHERE license_key = $1",
            )
            .bind(key)
            .fetch_optional(pool)
            .await
            .map_err(storage_error("get_license")),
        }
    }

    /// Every valid license for `product`, oldest first. Keys are plaintext.
    pub async fn get_all_valid(&self, product: &str) -> LicenseResult<Vec<LicenseRecord>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => sqlx::query_as::<_, LicenseRecord>(
                "SELECT id, license_key, product, email, valid FROM licenses \
                 WHERE valid = ? AND product = ? ORDER BY id",
            )
            .bind(true)
            .bind(product)
            .fetch_all(pool)
            .await
            .map_err(storage_error("get_all_valid")),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => sqlx::query_as::<_, LicenseRecord>(
                "SELECT id, license_key, product, email, valid FROM licenses \
                 WHERE valid = $1 AND product = $2 ORDER BY id",
            )
            .bind(true)
            .bind(product)
            .fetch_all(pool)
            .await
            .map_err(storage_error("get_all_valid")),
        }
    }

    /// Insert a new valid license, unless the key is already taken.
    ///
    /// One statement, no read before the write. The UNIQUE constraint on
    /// `license_key` decides collisions, including between concurrent inserts.
    pub async fn insert_license(
        &self,
        key: &str,
        product: &str,
        email: &str,
    ) -> LicenseResult<LicenseRecord> {
        let inserted = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => sqlx::query_as::<_, LicenseRecord>(
                "INSERT INTO licenses (license_key, product, email, valid) \
                 VALUES (?, ?, ?, ?) \
                 RETURNING id, license_key, product, email, valid",
            )
            .bind(key)
            .bind(product)
            .bind(email)
            .bind(true)
            .fetch_one(pool)
            .await,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => sqlx::query_as::<_, LicenseRecord>(
                "INSERT INTO licenses (license_key, product, email, valid) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, license_key, product, email, valid",
            )
            .bind(key)
            .bind(product)
            .bind(email)
            .bind(true)
            .fetch_one(pool)
            .await,
        };

        let inserted = match inserted {
            Err(e) if is_unique_violation(&e) => return Err(LicenseError::DuplicateKey),
            other => other.map_err(storage_error("insert_license"))?,
        };
        Ok(inserted)
    }

    /// Flip a valid license to invalid.
    ///
    /// The update only matches rows that are still valid, so two concurrent
    /// invalidations cannot both succeed. When nothing matched, the row is
    /// re-read in the same transaction to tell `NotFound` from
    /// `AlreadyInvalid`.
    pub async fn invalidate_license(&self, key: &str) -> LicenseResult<()> {
        let status = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                let mut tx = pool
                    .begin()
                    .await
                    .map_err(storage_error("begin invalidate"))?;

                let updated = sqlx::query(
                    "UPDATE licenses SET valid = ? WHERE license_key = ? AND valid = ?",
                )
                .bind(false)
                .bind(key)
                .bind(true)
                .execute(&mut *tx)
                .await
                .map_err(storage_error("invalidate_license"))?
                .rows_affected();

                if updated > 0 {
                    tx.commit()
                        .await
                        .map_err(storage_error("commit invalidate"))?;
                    return Ok(());
                }

                let valid: Option<bool> =
                    sqlx::query_scalar("SELECT valid FROM licenses WHERE license_key = ?")
                        .bind(key)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(storage_error("invalidate_license lookup"))?;
                KeyStatus::from_row(valid)
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                let mut tx = pool
                    .begin()
                    .await
                    .map_err(storage_error("begin invalidate"))?;

                let updated = sqlx::query(
                    "UPDATE licenses SET valid = $1 WHERE license_key = $2 AND valid = $3",
                )
                .bind(false)
                .bind(key)
                .bind(true)
                .execute(&mut *tx)
                .await
                .map_err(storage_error("invalidate_license"))?
                .rows_affected();

                if updated > 0 {
                    tx.commit()
                        .await
                        .map_err(storage_error("commit invalidate"))?;
                    return Ok(());
                }

                let valid: Option<bool> =
                    sqlx::query_scalar("SELECT valid FROM licenses WHERE license_key = $1")
                        .bind(key)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(storage_error("invalidate_license lookup"))?;
                KeyStatus::from_row(valid)
            }
        };

        match status {
            KeyStatus::Missing => Err(LicenseError::NotFound),
            KeyStatus::Invalid => Err(LicenseError::AlreadyInvalid),
            // A cleared flag is never set again, so the guarded update should
            // have matched this row.
            KeyStatus::Valid => Err(LicenseError::Storage(
                "license changed during invalidation".to_string(),
            )),
        }
    }
}
