//! Hybrid (Ed25519 + ML-DSA-87) signatures
//!
//! Every protected message is signed twice, once per scheme, and a
//! signature pair is only accepted when both halves verify against the
//! signer's published [`KeyBundlePublic`]. Failures of either half, and
//! malformed encodings, surface as the same [`SignatureError`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signature as Ed25519Signature, Signer};
use ml_dsa::{MlDsa87, Signature as MlDsaSignature};
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use sha2::{Digest, Sha256};

use super::keys::{ml_dsa_keypair, KeyBundlePrivate, KeyBundlePublic};

/// Size of an Ed25519 signature in bytes
pub const ED25519_SIGNATURE_SIZE: usize = 64;
/// Size of an ML-DSA-87 signature in bytes
pub const ML_DSA_87_SIGNATURE_SIZE: usize = 4627;

/// Separator between canonical message fields
const FIELD_SEPARATOR: u8 = b'|';
/// Separator in the combined `X-Signature` header form
const HEADER_SEPARATOR: char = '.';

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature invalid")]
    SignatureInvalid,
}

/// Join message fields with `|` in the order given.
pub fn canonical_message(fields: &[&[u8]]) -> Vec<u8> {
    let len = fields.iter().map(|f| f.len() + 1).sum::<usize>();
    let mut out = Vec::with_capacity(len);
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEPARATOR);
        }
        out.extend_from_slice(field);
    }
    out
}

/// Lowercase hex SHA-256 digest
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Canonical message covering an uploaded file:
/// `owner|hex(sha256(file_ciphertext))|hex(sha256(metadata_ciphertext))`.
pub fn file_message(owner: &str, file_ciphertext: &[u8], metadata_ciphertext: &[u8]) -> Vec<u8> {
    canonical_message(&[
        owner.as_bytes(),
        sha256_hex(file_ciphertext).as_bytes(),
        sha256_hex(metadata_ciphertext).as_bytes(),
    ])
}

/// A pre-quantum and a post-quantum signature over the same message
#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridSignature {
    #[serde_as(as = "Base64")]
    pub pre_quantum: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub post_quantum: Vec<u8>,
}

impl std::fmt::Debug for HybridSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSignature")
            .field("pre_quantum", &format!("{} bytes", self.pre_quantum.len()))
            .field("post_quantum", &format!("{} bytes", self.post_quantum.len()))
            .finish()
    }
}

impl HybridSignature {
    pub fn from_parts(pre_quantum: Vec<u8>, post_quantum: Vec<u8>) -> Self {
        Self {
            pre_quantum,
            post_quantum,
        }
    }

    /// Sign `message` independently with Ed25519 and ML-DSA-87.
    pub fn sign(message: &[u8], bundle: &KeyBundlePrivate) -> Self {
        let pre: Ed25519Signature = bundle.identity_signing().sign(message);

        let keypair = ml_dsa_keypair(bundle.pq_seed());
        let Ok(post) = keypair.signing_key().sign_deterministic(message, &[]) else {
            unreachable!("an empty context is always within the ML-DSA context limit");
        };

        Self {
            pre_quantum: pre.to_bytes().to_vec(),
            post_quantum: post.encode().to_vec(),
        }
    }

    /// Accept only if both signatures verify.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::SignatureInvalid`] if either signature is
    /// malformed, has the wrong length, or fails verification.
    pub fn verify(&self, message: &[u8], bundle: &KeyBundlePublic) -> Result<(), SignatureError> {
        let pre_ok = self.verify_pre_quantum(message, bundle);
        let post_ok = self.verify_post_quantum(message, bundle);
        if pre_ok && post_ok {
            Ok(())
        } else {
            Err(SignatureError::SignatureInvalid)
        }
    }

    fn verify_pre_quantum(&self, message: &[u8], bundle: &KeyBundlePublic) -> bool {
        if self.pre_quantum.len() != ED25519_SIGNATURE_SIZE {
            return false;
        }
        match Ed25519Signature::from_slice(&self.pre_quantum) {
            Ok(sig) => bundle
                .identity_signing()
                .verify_strict(message, &sig)
                .is_ok(),
            Err(_) => false,
        }
    }

    fn verify_post_quantum(&self, message: &[u8], bundle: &KeyBundlePublic) -> bool {
        if self.post_quantum.len() != ML_DSA_87_SIGNATURE_SIZE {
            return false;
        }
        let Some(verifying_key) = bundle.pq_verifying_key() else {
            return false;
        };
        match MlDsaSignature::<MlDsa87>::try_from(self.post_quantum.as_slice()) {
            Ok(sig) => verifying_key.verify_with_context(message, &[], &sig),
            Err(_) => false,
        }
    }

    /// Encode as `base64(pre).base64(post)` for the combined `X-Signature` header.
    pub fn to_header(&self) -> String {
        format!(
            "{}{}{}",
            STANDARD.encode(&self.pre_quantum),
            HEADER_SEPARATOR,
            STANDARD.encode(&self.post_quantum)
        )
    }

    /// Parse the combined `X-Signature` header form.
    pub fn from_header(value: &str) -> Result<Self, SignatureError> {
        let (pre, post) = value
            .split_once(HEADER_SEPARATOR)
            .ok_or(SignatureError::SignatureInvalid)?;
        Self::from_base64_parts(pre, post)
    }

    /// Parse the two signatures from separate base64 strings.
    pub fn from_base64_parts(pre: &str, post: &str) -> Result<Self, SignatureError> {
        let pre = STANDARD
            .decode(pre.trim())
            .map_err(|_| SignatureError::SignatureInvalid)?;
        let post = STANDARD
            .decode(post.trim())
            .map_err(|_| SignatureError::SignatureInvalid)?;
        Ok(Self::from_parts(pre, post))
    }
}
