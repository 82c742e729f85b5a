//! Cryptographic primitives for Strongbox
//!
//! Every byte the server stores is either ciphertext or public key material.
//! This module holds everything the client needs to keep it that way:
//!
//! - **Identity**: a [`KeyBundlePrivate`] per user, holding an X25519 KEM key,
//!   an Ed25519 signing key and an ML-DSA-87 signing key. The public half is
//!   the [`KeyBundlePublic`] registered with the server.
//! - **Per-file keys**: two random [`SecretShares`] feed HKDF-SHA256 to produce
//!   the FEK; the MEK is derived from the FEK.
//! - **Envelope encryption**: AES-256-GCM with a fresh nonce per call
//!   ([`SymmetricKey`]).
//! - **Hybrid signatures**: Ed25519 and ML-DSA-87 over the same canonical
//!   message ([`HybridSignature`]). Both halves must verify.
//! - **Sharing**: ephemeral X25519 ECDH rewraps the shares for a recipient
//!   ([`SharePayload`]).
//!
//! # Known gap
//!
//! Confidentiality of a share grant rests on X25519 alone. There is no
//! post-quantum KEM in the wrap, only in the signatures.

mod envelope;
mod file_keys;
mod hybrid;
mod keys;
mod secret_share;
mod spki;

pub use envelope::{
    EncryptedPayload, EnvelopeError, SymmetricKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE,
};
pub use file_keys::{derive_mek, FileKeyError, FileKeys, SecretShares, FEK_INFO, MEK_INFO, SHARE_SIZE};
pub use hybrid::{
    canonical_message, file_message, sha256_hex, HybridSignature, SignatureError,
    ED25519_SIGNATURE_SIZE, ML_DSA_87_SIGNATURE_SIZE,
};
pub use keys::{
    KeyBundleError, KeyBundlePrivate, KeyBundlePublic, ML_DSA_87_PUBLIC_KEY_SIZE,
    ML_DSA_SEED_SIZE, PRIVATE_KEY_SIZE,
};
pub use secret_share::{SharePayload, ShareError, EPHEMERAL_KEY_SIZE, WRAP_INFO};

/// Fill a fixed-size array from the OS RNG.
///
/// # Panics
///
/// If the OS RNG is unavailable. Key material is never drawn from a weaker source.
pub(crate) fn random_array<const N: usize>() -> [u8; N] {
    let mut buff = [0u8; N];
    getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
    buff
}
