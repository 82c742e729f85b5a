//! SubjectPublicKeyInfo framing for the pre-quantum identity keys
//!
//! Both X25519 and Ed25519 public keys are 32 bytes and share the same
//! fixed-length DER layout (RFC 8410):
//!
//! ```text
//! SEQUENCE (42) {
//!   SEQUENCE (5) { OBJECT IDENTIFIER 1.3.101.{110|112} }
//!   BIT STRING (33) { 0x00 unused bits, 32 key bytes }
//! }
//! ```
//!
//! Only that exact layout is accepted when decoding.

/// Raw public key length for X25519 and Ed25519
pub const RAW_KEY_SIZE: usize = 32;
/// Length of the DER header that precedes the raw key
const HEADER_SIZE: usize = 12;
/// Total DER length of an encoded key
pub const SPKI_SIZE: usize = HEADER_SIZE + RAW_KEY_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// id-X25519, OID 1.3.101.110
    X25519,
    /// id-Ed25519, OID 1.3.101.112
    Ed25519,
}

impl Algorithm {
    fn oid_arc(self) -> u8 {
        match self {
            Algorithm::X25519 => 0x6e,
            Algorithm::Ed25519 => 0x70,
        }
    }

    fn header(self) -> [u8; HEADER_SIZE] {
        [
            0x30,
            0x2a,
            0x30,
            0x05,
            0x06,
            0x03,
            0x2b,
            0x65,
            self.oid_arc(),
            0x03,
            0x21,
            0x00,
        ]
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SpkiError {
    #[error("expected {expected} bytes of DER, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("unrecognized algorithm identifier, expected {0:?}")]
    UnexpectedAlgorithm(Algorithm),
}

/// Wrap a raw 32-byte key in its SPKI DER encoding.
pub fn encode(algorithm: Algorithm, raw: &[u8; RAW_KEY_SIZE]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SPKI_SIZE);
    out.extend_from_slice(&algorithm.header());
    out.extend_from_slice(raw);
    out
}

/// Strip the SPKI DER framing, checking the algorithm identifier.
pub fn decode(algorithm: Algorithm, der: &[u8]) -> Result<[u8; RAW_KEY_SIZE], SpkiError> {
    if der.len() != SPKI_SIZE {
        return Err(SpkiError::InvalidLength {
            expected: SPKI_SIZE,
            actual: der.len(),
        });
    }
    let (header, key) = der.split_at(HEADER_SIZE);
    if header != algorithm.header().as_slice() {
        return Err(SpkiError::UnexpectedAlgorithm(algorithm));
    }
    let mut raw = [0u8; RAW_KEY_SIZE];
    raw.copy_from_slice(key);
    Ok(raw)
}
