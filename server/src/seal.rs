//! AEAD sealing for community PDS credentials (§4.3, §4.4).
//!
//! Community passwords and session tokens are encrypted with a server-side
//! key so they can be *recovered* for session renewal — not hashed, because
//! the PDS needs the plaintext password back when a refresh token is
//! revoked (§9 "Credential secrecy"). Grounded on
//! `chad-freeq/freeq-server/src/db.rs`'s `encrypt_at_rest`/`decrypt_at_rest`,
//! the only at-rest-AEAD pattern in the retrieved pack; `aes-gcm` is a new
//! dependency relative to the teacher for that reason (see DESIGN.md).

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    AeadCore, Aes256Gcm, Key,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("seal key must be exactly 32 bytes, got {0}")]
    BadKeyLength(usize),
    #[error("ciphertext is malformed or truncated")]
    Malformed,
    #[error("decryption failed (wrong key or tampered ciphertext)")]
    DecryptionFailed,
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct SealKey(Key<Aes256Gcm>);

impl SealKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SealError> {
        if bytes.len() != 32 {
            return Err(SealError::BadKeyLength(bytes.len()));
        }
        Ok(Self(*Key::<Aes256Gcm>::from_slice(bytes)))
    }

    /// Decodes the base64-encoded `SEAL_SECRET` environment value.
    pub fn from_base64(value: &str) -> Result<Self, SealError> {
        let bytes = STANDARD.decode(value)?;
        Self::from_bytes(&bytes)
    }
}

/// Encrypts `plaintext`, returning `base64(nonce || ciphertext)`.
pub fn seal(key: &SealKey, plaintext: &str) -> String {
    let cipher = Aes256Gcm::new(&key.0);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .expect("AES-256-GCM encryption does not fail for valid key/nonce sizes");
    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(nonce.as_slice());
    combined.extend_from_slice(&ciphertext);
    STANDARD.encode(combined)
}

/// Reverses [`seal`].
pub fn unseal(key: &SealKey, sealed: &str) -> Result<String, SealError> {
    let combined = STANDARD.decode(sealed)?;
    if combined.len() < NONCE_LEN {
        return Err(SealError::Malformed);
    }
    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(&key.0);
    let plaintext = cipher
        .decrypt(nonce_bytes.into(), ciphertext)
        .map_err(|_| SealError::DecryptionFailed)?;
    String::from_utf8(plaintext).map_err(|_| SealError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SealKey {
        SealKey::from_bytes(&[7u8; 32]).unwrap()
    }

    #[test]
    fn roundtrip() {
        let key = test_key();
        let sealed = seal(&key, "s3cr3t-password");
        assert_ne!(sealed, "s3cr3t-password");
        assert_eq!(unseal(&key, &sealed).unwrap(), "s3cr3t-password");
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = seal(&test_key(), "hunter2");
        let other = SealKey::from_bytes(&[9u8; 32]).unwrap();
        assert!(matches!(unseal(&other, &sealed), Err(SealError::DecryptionFailed)));
    }

    #[test]
    fn rejects_bad_key_length() {
        assert!(matches!(
            SealKey::from_bytes(&[0u8; 16]),
            Err(SealError::BadKeyLength(16))
        ));
    }

    #[test]
    fn each_seal_call_uses_a_fresh_nonce() {
        let key = test_key();
        assert_ne!(seal(&key, "same-plaintext"), seal(&key, "same-plaintext"));
    }
}
