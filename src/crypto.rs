//! Per-file envelope encryption.
//!
//! Every file gets its own AES-256-GCM data key. Blobs are laid out as
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use base64::Engine;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

pub const KEY_LEN: usize = 32;
pub const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Failed to generate random bytes")]
    KeyGeneration,
    #[error("Encryption failed")]
    Encryption,
    #[error("Ciphertext failed authentication")]
    AuthenticationFailure,
    #[error("Invalid data key: {0}")]
    InvalidKey(String),
}

/// A per-file data encryption key.
#[derive(Clone, PartialEq, Eq)]
pub struct DataKey([u8; KEY_LEN]);

impl DataKey {
    /// Fresh random key from the system CSPRNG.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| CryptoError::KeyGeneration)?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Standard base64, the at-rest form stored on the file record.
    pub fn encode(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    pub fn decode(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    fn aead_key(&self) -> LessSafeKey {
        // Length is fixed at KEY_LEN, which AES_256_GCM always accepts.
        let unbound = UnboundKey::new(&AES_256_GCM, &self.0)
            .unwrap_or_else(|_| unreachable!("AES-256 key is {KEY_LEN} bytes"));
        LessSafeKey::new(unbound)
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey(..)")
    }
}

/// Encrypt under a fresh random nonce and return `nonce || ciphertext || tag`.
pub fn encrypt(key: &DataKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| CryptoError::Encryption)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + plaintext.len() + TAG_LEN);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(plaintext);

    let tag = key
        .aead_key()
        .seal_in_place_separate_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut blob[NONCE_LEN..],
        )
        .map_err(|_| CryptoError::Encryption)?;
    blob.extend_from_slice(tag.as_ref());
    Ok(blob)
}

/// Verify and decrypt a blob produced by [`encrypt`].
pub fn decrypt(key: &DataKey, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::AuthenticationFailure);
    }
    let (nonce_bytes, sealed) = blob.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    let mut in_out = sealed.to_vec();
    let plaintext_len = key
        .aead_key()
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::AuthenticationFailure)?
        .len();
    in_out.truncate(plaintext_len);
    Ok(in_out)
}
