//! Jaskier Shared Pattern — crypto
//! At-rest encryption for long-lived upstream credentials.
//!
//! The process secret alone is never used as an AES key directly — it is
//! stretched through PBKDF2-HMAC-SHA256 first, the way
//! `original_source/app/services/encryption_service.py` derives its Fernet
//! key, reimplemented here with AES-256-GCM (the teacher's own
//! authenticated-encryption primitive) instead of Fernet.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use sha2::Sha256;

use crate::error::CryptoError;

const SALT: &[u8] = b"mutuals-credential-salt-v1";
const ENC_PREFIX: &str = "enc:";

fn derive_key(secret: &str, iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), SALT, iterations, &mut key);
    key
}

/// Encrypt `plaintext`, returning an `enc:`-prefixed, base64-encoded
/// nonce+ciphertext blob. The prefix lets callers distinguish encrypted
/// values from plaintext that predates encryption being enabled.
pub fn encrypt(plaintext: &str, secret: &str, iterations: u32) -> Result<String, CryptoError> {
    let key_bytes = derive_key(secret, iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

    let mut nonce_bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptFailed)?;

    let mut combined = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(format!("{ENC_PREFIX}{}", B64.encode(combined)))
}

/// Decrypt a value produced by [`encrypt`]. Values without the `enc:`
/// prefix are rejected — callers that need to tolerate legacy plaintext
/// should check for the prefix themselves before calling this.
pub fn decrypt(encoded: &str, secret: &str, iterations: u32) -> Result<String, CryptoError> {
    let b64 = encoded
        .strip_prefix(ENC_PREFIX)
        .ok_or(CryptoError::MalformedCiphertext)?;
    let combined = B64.decode(b64).map_err(|_| CryptoError::MalformedCiphertext)?;
    if combined.len() < 12 {
        return Err(CryptoError::MalformedCiphertext);
    }
    let (nonce_bytes, ciphertext) = combined.split_at(12);

    let key_bytes = derive_key(secret, iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let secret = "test-secret";
        let enc = encrypt("hunter2", secret, 1000).unwrap();
        assert!(enc.starts_with(ENC_PREFIX));
        let dec = decrypt(&enc, secret, 1000).unwrap();
        assert_eq!(dec, "hunter2");
    }

    #[test]
    fn wrong_secret_fails() {
        let enc = encrypt("hunter2", "secret-a", 1000).unwrap();
        assert!(decrypt(&enc, "secret-b", 1000).is_err());
    }

    #[test]
    fn rejects_unprefixed_values() {
        assert!(decrypt("not-encrypted", "secret", 1000).is_err());
    }
}
