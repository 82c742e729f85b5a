//! Envelope encryption using AES-256-GCM
//!
//! Every file is sealed under its own FEK and its metadata under the MEK
//! derived from it. The cipher is stateless: each call to
//! [`SymmetricKey::encrypt`] draws a fresh 96-bit nonce from the OS RNG and
//! hands it back alongside the ciphertext, and callers own nonce storage.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::random_array;

/// Size of an AES-256-GCM key in bytes
pub const KEY_SIZE: usize = 32;
/// Size of an AES-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag appended to every ciphertext
pub const TAG_SIZE: usize = 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Tag mismatch, wrong key, or a malformed nonce. Never carries partial output.
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("invalid key size, expected {expected}, got {actual}")]
    InvalidKeySize { expected: usize, actual: usize },
}

/// Ciphertext together with the nonce it was sealed under.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    #[serde_as(as = "Base64")]
    pub ciphertext: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub nonce: Vec<u8>,
}

impl EncryptedPayload {
    pub fn new(ciphertext: Vec<u8>, nonce: Vec<u8>) -> Self {
        Self { ciphertext, nonce }
    }
}

/// A 256-bit AEAD key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

impl From<[u8; KEY_SIZE]> for SymmetricKey {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        SymmetricKey(bytes)
    }
}

impl SymmetricKey {
    /// Generate a new random key
    ///
    /// # Panics
    ///
    /// If the OS RNG is unavailable.
    pub fn generate() -> Self {
        Self(random_array())
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, EnvelopeError> {
        let bytes: [u8; KEY_SIZE] = data.try_into().map_err(|_| EnvelopeError::InvalidKeySize {
            expected: KEY_SIZE,
            actual: data.len(),
        })?;
        Ok(bytes.into())
    }

    pub fn bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }

    /// Seal `plaintext` under a freshly generated nonce.
    ///
    /// # Panics
    ///
    /// If the OS RNG cannot supply the nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedPayload, EnvelopeError> {
        let nonce_bytes: [u8; NONCE_SIZE] = random_array();
        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| EnvelopeError::EncryptionFailed)?;

        Ok(EncryptedPayload::new(ciphertext, nonce_bytes.to_vec()))
    }

    /// Open a payload sealed by [`SymmetricKey::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::DecryptionFailed`] if the nonce is not
    /// `NONCE_SIZE` bytes or the authentication tag does not verify.
    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<Vec<u8>, EnvelopeError> {
        if payload.nonce.len() != NONCE_SIZE || payload.ciphertext.len() < TAG_SIZE {
            return Err(EnvelopeError::DecryptionFailed);
        }
        self.cipher()
            .decrypt(
                Nonce::from_slice(&payload.nonce),
                payload.ciphertext.as_ref(),
            )
            .map_err(|_| EnvelopeError::DecryptionFailed)
    }
}
