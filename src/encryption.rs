//! Symmetric encryption and transport encoding for license keys.
//!
//! A license key exists in three forms: the plaintext key (store-internal),
//! the AES-256-GCM ciphertext, and the base64 text of that ciphertext, which
//! is the only form that leaves the server.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use rand::rngs::OsRng;
use rand::TryRngCore;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

use crate::errors::{LicenseError, LicenseResult};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes (96-bit).
pub const NONCE_SIZE: usize = 12;

fn random_bytes<const N: usize>() -> LicenseResult<[u8; N]> {
    let mut buf = [0u8; N];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| LicenseError::Crypto(format!("OS random source failed: {e}")))?;
    Ok(buf)
}

/// Generate a new random 256-bit secret.
pub fn generate_secret() -> LicenseResult<[u8; KEY_SIZE]> {
    random_bytes::<KEY_SIZE>()
}

fn cipher_for(secret: &[u8]) -> LicenseResult<Aes256Gcm> {
    if secret.len() != KEY_SIZE {
        return Err(LicenseError::Crypto(format!(
            "invalid key length: expected {} bytes, got {}",
            KEY_SIZE,
            secret.len()
        )));
    }
    Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(secret)))
}

/// Encrypt arbitrary bytes using AES-256-GCM.
///
/// Output format:
///   [nonce (12 bytes)] || [ciphertext+tag]
pub fn encrypt_bytes(plaintext: &[u8], secret: &[u8]) -> LicenseResult<Vec<u8>> {
    let cipher = cipher_for(secret)?;

    let nonce_bytes = random_bytes::<NONCE_SIZE>()?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| LicenseError::Crypto(format!("encryption failed: {e}")))?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.append(&mut ciphertext);

    Ok(output)
}

/// Decrypt bytes produced by `encrypt_bytes`.
///
/// Any tampering with nonce, ciphertext or tag fails authentication.
pub fn decrypt_bytes(ciphertext: &[u8], secret: &[u8]) -> LicenseResult<Vec<u8>> {
    let cipher = cipher_for(secret)?;

    if ciphertext.len() <= NONCE_SIZE {
        return Err(LicenseError::Crypto("ciphertext too short".to_string()));
    }

    let (nonce_bytes, ct) = ciphertext.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ct)
        .map_err(|e| LicenseError::Crypto(format!("decryption failed: {e}")))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

pub fn decode_base64(text: &str) -> LicenseResult<Vec<u8>> {
    B64.decode(text)
        .map_err(|e| LicenseError::Encoding(format!("base64 decode failed: {e}")))
}

/// Encrypts and decrypts license keys with the process-wide secret.
///
/// Built once at startup from configuration; the secret is never rotated
/// while the process runs.
#[derive(Clone)]
pub struct KeyCodec {
    secret: [u8; KEY_SIZE],
}

impl std::fmt::Debug for KeyCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCodec").finish_non_exhaustive()
    }
}

impl KeyCodec {
    pub fn new(secret: &[u8]) -> LicenseResult<Self> {
        let secret: [u8; KEY_SIZE] = secret.try_into().map_err(|_| {
            LicenseError::Crypto(format!(
                "invalid key length: expected {} bytes, got {}",
                KEY_SIZE,
                secret.len()
            ))
        })?;
        Ok(Self { secret })
    }

    /// Plaintext key -> base64 ciphertext.
    pub fn encrypt_key(&self, plaintext: &str) -> LicenseResult<String> {
        let encrypted = encrypt_bytes(plaintext.as_bytes(), &self.secret)?;
        Ok(encode_base64(&encrypted))
    }

    /// Base64 ciphertext -> plaintext key.
    ///
    /// Decoding is checked before decryption, so malformed text surfaces as
    /// `Encoding` and tampered ciphertext as `Crypto`.
    pub fn decrypt_key(&self, encoded: &str) -> LicenseResult<String> {
        let encrypted = decode_base64(encoded)?;
        let plaintext = decrypt_bytes(&encrypted, &self.secret)?;
        String::from_utf8(plaintext)
            .map_err(|_| LicenseError::Crypto("decrypted key is not UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_encrypt_decrypt_bytes() {
        let key = generate_secret().unwrap();
        let data = b"AB12-xy9Z-44qR";

        let encrypted = encrypt_bytes(data, &key).expect("encryption should succeed");
        assert_ne!(&encrypted[NONCE_SIZE..], data, "ciphertext must differ from plaintext");

        let decrypted = decrypt_bytes(&encrypted, &key).expect("decryption should succeed");
        assert_eq!(decrypted, data);
    }

    #[test]
    fn base64_round_trip_preserves_bytes() {
        let bytes: Vec<u8> = (0..=255).collect();
        assert_eq!(decode_base64(&encode_base64(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn rejects_wrong_key_size() {
        let key = [0u8; 16];
        let data = b"test";

        assert!(matches!(
            encrypt_bytes(data, &key),
            Err(LicenseError::Crypto(_))
        ));
        assert!(matches!(
            decrypt_bytes(&[0u8; NONCE_SIZE + 16], &key),
            Err(LicenseError::Crypto(_))
        ));
        assert!(KeyCodec::new(&key).is_err());
    }

    #[test]
    fn every_flipped_bit_fails_authentication() {
        let key = generate_secret().unwrap();
        let encrypted = encrypt_bytes(b"AB12-xy9Z-44qR", &key).unwrap();

        for byte in 0..encrypted.len() {
            for bit in 0..8 {
                let mut tampered = encrypted.clone();
                tampered[byte] ^= 1 << bit;
                assert!(
                    matches!(decrypt_bytes(&tampered, &key), Err(LicenseError::Crypto(_))),
                    "flip of bit {bit} in byte {byte} was not detected"
                );
            }
        }
    }

    #[test]
    fn wrong_secret_fails_authentication() {
        let encrypted = encrypt_bytes(b"AB12-xy9Z-44qR", &[1u8; KEY_SIZE]).unwrap();
        assert!(decrypt_bytes(&encrypted, &[2u8; KEY_SIZE]).is_err());
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        let key = [7u8; KEY_SIZE];
        assert!(decrypt_bytes(&[0u8; NONCE_SIZE], &key).is_err());
        assert!(decrypt_bytes(&[], &key).is_err());
    }

    #[test]
    fn codec_round_trips_keys() {
        let codec = KeyCodec::new(&[9u8; KEY_SIZE]).unwrap();
        let encoded = codec.encrypt_key("AB12-xy9Z-44qR").unwrap();
        assert_ne!(encoded, "AB12-xy9Z-44qR");
        assert_eq!(codec.decrypt_key(&encoded).unwrap(), "AB12-xy9Z-44qR");
    }

    #[test]
    fn codec_uses_fresh_nonce_per_encryption() {
        let codec = KeyCodec::new(&[9u8; KEY_SIZE]).unwrap();
        let a = codec.encrypt_key("AB12-xy9Z-44qR").unwrap();
        let b = codec.encrypt_key("AB12-xy9Z-44qR").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn codec_distinguishes_encoding_from_crypto_failures() {
        let codec = KeyCodec::new(&[9u8; KEY_SIZE]).unwrap();
        assert!(matches!(
            codec.decrypt_key("not base64!!"),
            Err(LicenseError::Encoding(_))
        ));
        assert!(matches!(
            codec.decrypt_key(&encode_base64(&[0u8; 40])),
            Err(LicenseError::Crypto(_))
        ));
    }
}
