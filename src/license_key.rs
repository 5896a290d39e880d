//! License key generation and format checks.
//!
//! Keys are three groups of four alphanumeric characters joined by hyphens,
//! e.g. `AB12-xy9Z-44qR`. Generation gives no uniqueness guarantee; the store
//! rejects collisions at insert time.

use rand::Rng;
use sha2::{Digest, Sha256};

/// 62-character alphanumeric alphabet, sampled uniformly.
const LICENSE_KEY_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of hyphen-separated groups in a key.
pub const KEY_GROUPS: usize = 3;

/// Characters per group.
pub const GROUP_LENGTH: usize = 4;

fn generate_group(rng: &mut impl Rng) -> String {
    (0..GROUP_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..LICENSE_KEY_CHARSET.len());
            LICENSE_KEY_CHARSET[idx] as char
        })
        .collect()
}

/// Generate a fresh plaintext license key.
///
/// ```
/// let key = keystead::license_key::generate_license_key();
/// assert!(keystead::license_key::validate_license_key_format(&key));
/// ```
pub fn generate_license_key() -> String {
    let mut rng = rand::rng();
    let groups: Vec<String> = (0..KEY_GROUPS).map(|_| generate_group(&mut rng)).collect();
    groups.join("-")
}

/// Check that `key` has the `XXXX-XXXX-XXXX` alphanumeric shape.
pub fn validate_license_key_format(key: &str) -> bool {
    let groups: Vec<&str> = key.split('-').collect();
    groups.len() == KEY_GROUPS
        && groups.iter().all(|group| {
            group.len() == GROUP_LENGTH && group.bytes().all(|b| b.is_ascii_alphanumeric())
        })
}

/// Short, stable fingerprint of a plaintext key for log correlation.
///
/// Logs carry this instead of the key itself.
pub fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..6])
}
