//! License lifecycle operations.
//!
//! [`LicenseService`] sits between the HTTP handlers and the store. Every
//! inbound key is decoded and decrypted here before the store sees it, and
//! every key leaving here is re-encrypted. Business results (already invalid,
//! nonexistent, wrong product) come back as [`Outcome`] values; only real
//! failures are errors.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::encryption::KeyCodec;
use crate::errors::{LicenseError, LicenseResult};
use crate::license_key::{generate_license_key, key_fingerprint};
use crate::models::{Outcome, PublicRecord};
use crate::server::database::{Database, LicenseRecord, ProductValidity};
use crate::server::logging::{log_license_event, LicenseEvent};

#[derive(Debug, Clone)]
pub struct LicenseService {
    db: Arc<Database>,
    codec: KeyCodec,
}

impl LicenseService {
    pub fn new(db: Arc<Database>, codec: KeyCodec) -> Self {
        Self { db, codec }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Issue a new license and return its encoded key.
    ///
    /// A single candidate key is generated. If it collides with a stored key
    /// the call fails with `DuplicateKey`; there is no retry.
    pub async fn create(&self, product: &str, email: &str) -> LicenseResult<String> {
        let key = generate_license_key();
        let record = self.db.insert_license(&key, product, email).await?;

        log_license_event(
            LicenseEvent::Created,
            &key_fingerprint(&record.license_key),
            Some(product),
        );

        self.codec.encrypt_key(&record.license_key)
    }

    /// All valid licenses for `product`, keys encoded. Empty is not an error.
    pub async fn get_all(&self, product: &str) -> LicenseResult<Vec<PublicRecord>> {
        self.db
            .get_all_valid(product)
            .await?
            .into_iter()
            .map(|record| -> LicenseResult<PublicRecord> {
                let encoded = self.codec.encrypt_key(&record.license_key)?;
                Ok(public_record(record, encoded))
            })
            .collect()
    }

    /// Fetch one license. The returned key is the caller's own encoding.
    pub async fn get_one(&self, encoded_key: &str) -> LicenseResult<PublicRecord> {
        let key = self.decode_key(encoded_key)?;
        let record = self.db.get_license(&key).await?;
        Ok(public_record(record, encoded_key.to_string()))
    }

    /// Invalidate a license.
    ///
    /// Nonexistent and already-invalid licenses are outcomes, not errors.
    pub async fn invalidate(&self, encoded_key: &str) -> LicenseResult<Outcome> {
        let key = self.decode_key(encoded_key)?;
        let fingerprint = key_fingerprint(&key);

        match self.db.invalidate_license(&key).await {
            Ok(()) => {
                log_license_event(LicenseEvent::Invalidated, &fingerprint, None);
                Ok(Outcome::Invalidated)
            }
            Err(LicenseError::AlreadyInvalid) => {
                log_license_event(
                    LicenseEvent::InvalidationRejected,
                    &fingerprint,
                    Some("already invalid"),
                );
                Ok(Outcome::AlreadyInvalid)
            }
            Err(LicenseError::NotFound) => {
                log_license_event(
                    LicenseEvent::InvalidationRejected,
                    &fingerprint,
                    Some("nonexistent"),
                );
                Ok(Outcome::Nonexistent)
            }
            Err(e) => Err(e),
        }
    }

    /// Check a license against a product.
    ///
    /// Backs the public endpoint: a key that fails to decode or decrypt is
    /// simply `Invalid`, with no detail. Only storage failures are errors.
    /// Never mutates stored state.
    pub async fn check_validity(&self, encoded_key: &str, product: &str) -> LicenseResult<Outcome> {
        let key = match self.decode_key(encoded_key) {
            Ok(key) => key,
            Err(_) => return Ok(Outcome::Invalid),
        };
        let fingerprint = key_fingerprint(&key);

        let outcome = match self.db.check_valid_for_product(&key, product).await? {
            ProductValidity::Valid => Outcome::Valid,
            ProductValidity::Invalid => Outcome::Invalid,
            ProductValidity::ProductMismatch => Outcome::ProductMismatch,
            ProductValidity::NotFound => Outcome::Nonexistent,
        };

        if outcome == Outcome::Valid {
            log_license_event(LicenseEvent::Validated, &fingerprint, Some(product));
        } else {
            log_license_event(
                LicenseEvent::ValidationFailed,
                &fingerprint,
                Some(outcome.message()),
            );
        }

        Ok(outcome)
    }

    /// Base64 ciphertext -> plaintext key, collapsing decode and decrypt
    /// failures into `BadKey`.
    fn decode_key(&self, encoded_key: &str) -> LicenseResult<String> {
        self.codec.decrypt_key(encoded_key).map_err(|e| {
            match &e {
                LicenseError::Encoding(_) => debug!("Rejected key with bad encoding: {e}"),
                _ => warn!("Rejected key that failed decryption: {e}"),
            }
            LicenseError::BadKey(e.to_string())
        })
    }
}

fn public_record(record: LicenseRecord, encoded_key: String) -> PublicRecord {
    PublicRecord {
        key: encoded_key,
        product: record.product,
        email: record.email,
        valid: record.valid,
    }
}
