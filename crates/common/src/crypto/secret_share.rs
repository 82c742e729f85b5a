//! Rewrapping a file's key material for a second user
//!
//! The owner never hands the server anything the server could open. To
//! share a file, the owner:
//! 1. Generates an ephemeral X25519 keypair
//! 2. Performs ECDH with the recipient's `identityKemPublicKey`
//! 3. Derives a wrapping key with HKDF-SHA256 over the shared secret, salted
//!    with `ephemeral_public || recipient_public`
//! 4. Seals `s_pre` and `s_post` under the wrapping key, each with its own nonce
//! 5. Publishes a [`SharePayload`] holding the ephemeral public key, the two
//!    wrapped shares, and the nonces the file and its metadata were sealed under
//!
//! The recipient repeats the ECDH with its private KEM key and the stored
//! ephemeral public key, unwraps both shares, and re-derives FEK and MEK.

use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use super::envelope::{EncryptedPayload, EnvelopeError, SymmetricKey};
use super::file_keys::{hkdf_sha256, FileKeyError, SecretShares};
use super::keys::{KeyBundlePrivate, KeyBundlePublic};
use super::random_array;

/// Size of an X25519 ephemeral public key in bytes
pub const EPHEMERAL_KEY_SIZE: usize = 32;
/// HKDF info string for the share wrapping key
pub const WRAP_INFO: &[u8] = b"file_share_wrap_v1";

/// Errors that can occur while wrapping or unwrapping shares
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShareError {
    #[error("invalid ephemeral public key")]
    InvalidEphemeralKey,
    #[error("key agreement produced a non-contributory shared secret")]
    NonContributory,
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("unwrapped share is malformed: {0}")]
    Share(#[from] FileKeyError),
}

/// Everything a recipient needs to open a shared file, minus the ciphertext
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    #[serde_as(as = "Base64")]
    pub ephemeral_public_key: Vec<u8>,
    /// `s_pre` sealed under the wrapping key
    #[serde_as(as = "Base64")]
    pub encrypted_fek: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub encrypted_fek_nonce: Vec<u8>,
    /// `s_post` sealed under the wrapping key
    #[serde_as(as = "Base64")]
    pub encrypted_mek: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub encrypted_mek_nonce: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub file_content_nonce: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub metadata_nonce: Vec<u8>,
}

fn wrapping_key(
    secret: &StaticSecret,
    their_public: &X25519PublicKey,
    ephemeral_public: &X25519PublicKey,
    recipient_public: &X25519PublicKey,
) -> Result<SymmetricKey, ShareError> {
    let shared = secret.diffie_hellman(their_public);
    if !shared.was_contributory() {
        return Err(ShareError::NonContributory);
    }

    let mut salt = [0u8; EPHEMERAL_KEY_SIZE * 2];
    salt[..EPHEMERAL_KEY_SIZE].copy_from_slice(ephemeral_public.as_bytes());
    salt[EPHEMERAL_KEY_SIZE..].copy_from_slice(recipient_public.as_bytes());

    let okm = Zeroizing::new(hkdf_sha256(Some(&salt), shared.as_bytes(), WRAP_INFO));
    Ok(SymmetricKey::from(*okm))
}

impl SharePayload {
    /// Wrap `shares` for `recipient`.
    ///
    /// `file_content_nonce` and `metadata_nonce` are the nonces the owner
    /// sealed the file and its metadata under; they travel in the clear.
    ///
    /// # Panics
    ///
    /// If the OS RNG cannot supply the ephemeral key.
    pub fn seal(
        shares: &SecretShares,
        file_content_nonce: &[u8],
        metadata_nonce: &[u8],
        recipient: &KeyBundlePublic,
    ) -> Result<Self, ShareError> {
        let ephemeral = StaticSecret::from(random_array::<EPHEMERAL_KEY_SIZE>());
        let ephemeral_public = X25519PublicKey::from(&ephemeral);
        let recipient_public = recipient.identity_kem();

        let key = wrapping_key(
            &ephemeral,
            recipient_public,
            &ephemeral_public,
            recipient_public,
        )?;

        let wrapped_pre = key.encrypt(shares.pre())?;
        let wrapped_post = key.encrypt(shares.post())?;

        Ok(Self {
            ephemeral_public_key: ephemeral_public.as_bytes().to_vec(),
            encrypted_fek: wrapped_pre.ciphertext,
            encrypted_fek_nonce: wrapped_pre.nonce,
            encrypted_mek: wrapped_post.ciphertext,
            encrypted_mek_nonce: wrapped_post.nonce,
            file_content_nonce: file_content_nonce.to_vec(),
            metadata_nonce: metadata_nonce.to_vec(),
        })
    }

    /// Recover the shares with the recipient's private bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the ephemeral key is malformed, or if either
    /// wrapped share fails to authenticate (wrong recipient or tampering).
    pub fn open(&self, recipient: &KeyBundlePrivate) -> Result<SecretShares, ShareError> {
        let ephemeral_bytes: [u8; EPHEMERAL_KEY_SIZE] = self
            .ephemeral_public_key
            .as_slice()
            .try_into()
            .map_err(|_| ShareError::InvalidEphemeralKey)?;
        let ephemeral_public = X25519PublicKey::from(ephemeral_bytes);

        let key = wrapping_key(
            recipient.identity_kem(),
            &ephemeral_public,
            &ephemeral_public,
            recipient.public().identity_kem(),
        )?;

        let pre = Zeroizing::new(key.decrypt(&EncryptedPayload::new(
            self.encrypted_fek.clone(),
            self.encrypted_fek_nonce.clone(),
        ))?);
        let post = Zeroizing::new(key.decrypt(&EncryptedPayload::new(
            self.encrypted_mek.clone(),
            self.encrypted_mek_nonce.clone(),
        ))?);

        Ok(SecretShares::from_slices(&pre, &post)?)
    }

    /// Pair downloaded file ciphertext with the nonce carried in this share.
    pub fn file_content_payload(&self, ciphertext: Vec<u8>) -> EncryptedPayload {
        EncryptedPayload::new(ciphertext, self.file_content_nonce.clone())
    }

    /// Pair downloaded metadata ciphertext with the nonce carried in this share.
    pub fn metadata_payload(&self, ciphertext: Vec<u8>) -> EncryptedPayload {
        EncryptedPayload::new(ciphertext, self.metadata_nonce.clone())
    }
}
