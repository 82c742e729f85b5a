use std::fmt;

use ed25519_dalek::{SigningKey, VerifyingKey};
use ml_dsa::{EncodedVerifyingKey, KeyGen, KeyPair, MlDsa87, VerifyingKey as MlDsaVerifyingKey};
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use super::random_array;
use super::spki::{self, Algorithm, RAW_KEY_SIZE};

/// Size of an X25519 or Ed25519 private key in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of the seed an ML-DSA-87 keypair is expanded from
pub const ML_DSA_SEED_SIZE: usize = 32;
/// Size of an encoded ML-DSA-87 verifying key
pub const ML_DSA_87_PUBLIC_KEY_SIZE: usize = 2592;

const SECRET_BUNDLE_VERSION: u8 = 1;
const SECRET_BUNDLE_SIZE: usize = 1 + PRIVATE_KEY_SIZE * 2 + ML_DSA_SEED_SIZE;

/// Errors raised while decoding a key bundle
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyBundleError {
    #[error("malformed key bundle: {0}")]
    MalformedKeyBundle(String),
}

impl KeyBundleError {
    fn malformed(reason: impl Into<String>) -> Self {
        KeyBundleError::MalformedKeyBundle(reason.into())
    }
}

/// Expand an ML-DSA-87 keypair from its 32-byte seed.
pub(crate) fn ml_dsa_keypair(seed: &[u8; ML_DSA_SEED_SIZE]) -> KeyPair<MlDsa87> {
    MlDsa87::key_gen_internal(&(*seed).into())
}

/// Public half of a user's identity
///
/// Holds the three public keys a user publishes:
/// - `identity_kem`: X25519, used as the recipient key when files are shared
/// - `identity_signing`: Ed25519, the pre-quantum signature key
/// - `pq_identity_signing`: ML-DSA-87, the post-quantum signature key
///
/// Serializes to the JSON transport object
///
/// ```text
/// {"preQuantum":{"identityKemPublicKey":"<b64 SPKI>","identitySigningPublicKey":"<b64 SPKI>"},
///  "postQuantum":{"identitySigningPublicKey":"<b64 raw>"}}
/// ```
///
/// Every field is validated on the way in, so a value of this type is
/// always usable for verification and key agreement.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KeyBundleWire", into = "KeyBundleWire")]
pub struct KeyBundlePublic {
    identity_kem: X25519PublicKey,
    identity_signing: VerifyingKey,
    pq_identity_signing: Vec<u8>,
}

impl fmt::Debug for KeyBundlePublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBundlePublic")
            .field("identity_kem", &hex::encode(self.identity_kem.as_bytes()))
            .field("identity_signing", &hex::encode(self.identity_signing.as_bytes()))
            .field(
                "pq_identity_signing",
                &format!("{}..", hex::encode(&self.pq_identity_signing[..8])),
            )
            .finish()
    }
}

impl KeyBundlePublic {
    pub fn identity_kem(&self) -> &X25519PublicKey {
        &self.identity_kem
    }

    pub fn identity_signing(&self) -> &VerifyingKey {
        &self.identity_signing
    }

    /// Raw encoded ML-DSA-87 verifying key
    pub fn pq_identity_signing(&self) -> &[u8] {
        &self.pq_identity_signing
    }

    pub(crate) fn pq_verifying_key(&self) -> Option<MlDsaVerifyingKey<MlDsa87>> {
        let encoded = EncodedVerifyingKey::<MlDsa87>::try_from(self.pq_identity_signing.as_slice())
            .ok()?;
        Some(MlDsaVerifyingKey::decode(&encoded))
    }

    /// Encode to the JSON transport format.
    pub fn to_json(&self) -> String {
        let Ok(json) = serde_json::to_string(self) else {
            unreachable!("key bundle wire format only contains strings");
        };
        json
    }

    /// Decode from the JSON transport format.
    ///
    /// # Errors
    ///
    /// Returns [`KeyBundleError::MalformedKeyBundle`] if any field is absent,
    /// is not base64, has the wrong length, or carries an unrecognized
    /// algorithm identifier.
    pub fn from_json(data: &str) -> Result<Self, KeyBundleError> {
        serde_json::from_str(data).map_err(|e| KeyBundleError::malformed(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyBundleWire {
    pre_quantum: PreQuantumWire,
    post_quantum: PostQuantumWire,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreQuantumWire {
    #[serde_as(as = "Base64")]
    identity_kem_public_key: Vec<u8>,
    #[serde_as(as = "Base64")]
    identity_signing_public_key: Vec<u8>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostQuantumWire {
    #[serde_as(as = "Base64")]
    identity_signing_public_key: Vec<u8>,
}

impl From<KeyBundlePublic> for KeyBundleWire {
    fn from(bundle: KeyBundlePublic) -> Self {
        KeyBundleWire {
            pre_quantum: PreQuantumWire {
                identity_kem_public_key: spki::encode(
                    Algorithm::X25519,
                    bundle.identity_kem.as_bytes(),
                ),
                identity_signing_public_key: spki::encode(
                    Algorithm::Ed25519,
                    bundle.identity_signing.as_bytes(),
                ),
            },
            post_quantum: PostQuantumWire {
                identity_signing_public_key: bundle.pq_identity_signing,
            },
        }
    }
}

impl TryFrom<KeyBundleWire> for KeyBundlePublic {
    type Error = KeyBundleError;

    fn try_from(wire: KeyBundleWire) -> Result<Self, Self::Error> {
        let kem_raw = spki::decode(
            Algorithm::X25519,
            &wire.pre_quantum.identity_kem_public_key,
        )
        .map_err(|e| KeyBundleError::malformed(format!("identityKemPublicKey: {}", e)))?;

        let signing_raw = spki::decode(
            Algorithm::Ed25519,
            &wire.pre_quantum.identity_signing_public_key,
        )
        .map_err(|e| KeyBundleError::malformed(format!("identitySigningPublicKey: {}", e)))?;
        let identity_signing = VerifyingKey::from_bytes(&signing_raw)
            .map_err(|_| KeyBundleError::malformed("identitySigningPublicKey: invalid point"))?;

        let pq = wire.post_quantum.identity_signing_public_key;
        if pq.len() != ML_DSA_87_PUBLIC_KEY_SIZE {
            return Err(KeyBundleError::malformed(format!(
                "postQuantum identitySigningPublicKey: expected {} bytes, got {}",
                ML_DSA_87_PUBLIC_KEY_SIZE,
                pq.len()
            )));
        }

        Ok(KeyBundlePublic {
            identity_kem: X25519PublicKey::from(kem_raw),
            identity_signing,
            pq_identity_signing: pq,
        })
    }
}

/// Private half of a user's identity
///
/// Never leaves the owning device unencrypted. The password-protected
/// store that keeps it at rest works on the bytes produced by
/// [`KeyBundlePrivate::to_secret_bytes`].
///
/// The ML-DSA-87 key is held as its 32-byte seed and expanded on demand.
#[derive(Clone)]
pub struct KeyBundlePrivate {
    identity_kem: StaticSecret,
    identity_signing: SigningKey,
    pq_seed: Zeroizing<[u8; ML_DSA_SEED_SIZE]>,
    public: KeyBundlePublic,
}

impl fmt::Debug for KeyBundlePrivate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBundlePrivate")
            .field("public", &self.public)
            .field("secrets", &"[REDACTED]")
            .finish()
    }
}

impl KeyBundlePrivate {
    /// Generate fresh X25519, Ed25519 and ML-DSA-87 keypairs.
    ///
    /// # Panics
    ///
    /// If the OS RNG is unavailable.
    pub fn generate() -> Self {
        Self::from_parts(
            random_array(),
            random_array(),
            Zeroizing::new(random_array()),
        )
    }

    fn from_parts(
        kem: [u8; PRIVATE_KEY_SIZE],
        signing: [u8; PRIVATE_KEY_SIZE],
        pq_seed: Zeroizing<[u8; ML_DSA_SEED_SIZE]>,
    ) -> Self {
        let identity_kem = StaticSecret::from(kem);
        let identity_signing = SigningKey::from_bytes(&signing);
        let pq_identity_signing = ml_dsa_keypair(&pq_seed)
            .verifying_key()
            .encode()
            .to_vec();

        let public = KeyBundlePublic {
            identity_kem: X25519PublicKey::from(&identity_kem),
            identity_signing: identity_signing.verifying_key(),
            pq_identity_signing,
        };

        Self {
            identity_kem,
            identity_signing,
            pq_seed,
            public,
        }
    }

    pub fn public(&self) -> &KeyBundlePublic {
        &self.public
    }

    pub(crate) fn identity_kem(&self) -> &StaticSecret {
        &self.identity_kem
    }

    pub(crate) fn identity_signing(&self) -> &SigningKey {
        &self.identity_signing
    }

    pub(crate) fn pq_seed(&self) -> &[u8; ML_DSA_SEED_SIZE] {
        &self.pq_seed
    }

    /// Export the private keys for a local at-rest store.
    ///
    /// Layout: `version (1) || x25519 (32) || ed25519 (32) || ml-dsa seed (32)`.
    pub fn to_secret_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(SECRET_BUNDLE_SIZE));
        out.push(SECRET_BUNDLE_VERSION);
        out.extend_from_slice(&self.identity_kem.to_bytes());
        out.extend_from_slice(&self.identity_signing.to_bytes());
        out.extend_from_slice(&self.pq_seed[..]);
        out
    }

    /// Import keys exported by [`KeyBundlePrivate::to_secret_bytes`].
    pub fn from_secret_bytes(data: &[u8]) -> Result<Self, KeyBundleError> {
        if data.len() != SECRET_BUNDLE_SIZE {
            return Err(KeyBundleError::malformed(format!(
                "secret bundle: expected {} bytes, got {}",
                SECRET_BUNDLE_SIZE,
                data.len()
            )));
        }
        if data[0] != SECRET_BUNDLE_VERSION {
            return Err(KeyBundleError::malformed(format!(
                "secret bundle: unsupported version {}",
                data[0]
            )));
        }

        let mut kem = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
        let mut signing = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
        let mut seed = Zeroizing::new([0u8; ML_DSA_SEED_SIZE]);
        kem.copy_from_slice(&data[1..1 + RAW_KEY_SIZE]);
        signing.copy_from_slice(&data[1 + RAW_KEY_SIZE..1 + RAW_KEY_SIZE * 2]);
        seed.copy_from_slice(&data[1 + RAW_KEY_SIZE * 2..]);

        Ok(Self::from_parts(*kem, *signing, seed))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generate_produces_distinct_bundles() {
        let a = KeyBundlePrivate::generate();
        let b = KeyBundlePrivate::generate();
        assert_ne!(a.public(), b.public());
        assert_eq!(
            a.public().pq_identity_signing().len(),
            ML_DSA_87_PUBLIC_KEY_SIZE
        );
    }

    #[test]
    fn test_public_json_roundtrip() {
        let bundle = KeyBundlePrivate::generate();
        let json = bundle.public().to_json();
        let recovered = KeyBundlePublic::from_json(&json).unwrap();
        assert_eq!(&recovered, bundle.public());
        // serialization is deterministic
        assert_eq!(recovered.to_json(), json);
    }

    #[test]
    fn test_public_json_shape() {
        let bundle = KeyBundlePrivate::generate();
        let value: serde_json::Value = serde_json::from_str(&bundle.public().to_json()).unwrap();
        assert!(value["preQuantum"]["identityKemPublicKey"].is_string());
        assert!(value["preQuantum"]["identitySigningPublicKey"].is_string());
        assert!(value["postQuantum"]["identitySigningPublicKey"].is_string());
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let bundle = KeyBundlePrivate::generate();
        let mut value: serde_json::Value =
            serde_json::from_str(&bundle.public().to_json()).unwrap();
        value["preQuantum"]
            .as_object_mut()
            .unwrap()
            .remove("identityKemPublicKey");

        let result = KeyBundlePublic::from_json(&value.to_string());
        assert!(matches!(result, Err(KeyBundleError::MalformedKeyBundle(_))));
    }

    #[test]
    fn test_swapped_algorithms_are_malformed() {
        let bundle = KeyBundlePrivate::generate();
        let mut value: serde_json::Value =
            serde_json::from_str(&bundle.public().to_json()).unwrap();
        let kem = value["preQuantum"]["identityKemPublicKey"].clone();
        let signing = value["preQuantum"]["identitySigningPublicKey"].clone();
        value["preQuantum"]["identityKemPublicKey"] = signing;
        value["preQuantum"]["identitySigningPublicKey"] = kem;

        let result = KeyBundlePublic::from_json(&value.to_string());
        assert!(matches!(result, Err(KeyBundleError::MalformedKeyBundle(_))));
    }

    #[test]
    fn test_short_pq_key_is_malformed() {
        let bundle = KeyBundlePrivate::generate();
        let mut value: serde_json::Value =
            serde_json::from_str(&bundle.public().to_json()).unwrap();
        value["postQuantum"]["identitySigningPublicKey"] = "AAAA".into();

        let result = KeyBundlePublic::from_json(&value.to_string());
        assert!(matches!(result, Err(KeyBundleError::MalformedKeyBundle(_))));
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        let json = r#"{"preQuantum":{"identityKemPublicKey":"***","identitySigningPublicKey":"***"},"postQuantum":{"identitySigningPublicKey":"***"}}"#;
        assert!(matches!(
            KeyBundlePublic::from_json(json),
            Err(KeyBundleError::MalformedKeyBundle(_))
        ));
    }

    #[test]
    fn test_secret_bytes_roundtrip() {
        let bundle = KeyBundlePrivate::generate();
        let secret = bundle.to_secret_bytes();
        assert_eq!(secret.len(), SECRET_BUNDLE_SIZE);

        let restored = KeyBundlePrivate::from_secret_bytes(&secret).unwrap();
        assert_eq!(restored.public(), bundle.public());
    }

    #[test]
    fn test_secret_bytes_rejects_bad_version() {
        let bundle = KeyBundlePrivate::generate();
        let mut secret = bundle.to_secret_bytes().to_vec();
        secret[0] = 9;
        assert!(KeyBundlePrivate::from_secret_bytes(&secret).is_err());
        assert!(KeyBundlePrivate::from_secret_bytes(&secret[..10]).is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let bundle = KeyBundlePrivate::generate();
        let debug = format!("{:?}", bundle);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(&hex::encode(bundle.identity_signing().to_bytes())));
    }
}
