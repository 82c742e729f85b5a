//! Per-file key derivation
//!
//! A file's key material is two independently random 32-byte shares. The
//! File Encryption Key (FEK) is HKDF-SHA256 over `s_pre || s_post`; the
//! Metadata Encryption Key (MEK) is HKDF-SHA256 over the FEK bytes. Both use
//! an empty salt and distinct, versioned info strings.
//!
//! ```text
//! s_pre || s_post ──HKDF("owner_file_fek_derivation_v1")──► FEK ──HKDF("file_metadata_encryption_v1")──► MEK
//! ```

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::envelope::{SymmetricKey, KEY_SIZE};
use super::random_array;

/// Size of each secret share in bytes
pub const SHARE_SIZE: usize = 32;
/// HKDF info string for FEK derivation
pub const FEK_INFO: &[u8] = b"owner_file_fek_derivation_v1";
/// HKDF info string for MEK derivation
pub const MEK_INFO: &[u8] = b"file_metadata_encryption_v1";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FileKeyError {
    #[error("invalid share size, expected {expected}, got {actual}")]
    InvalidShareSize { expected: usize, actual: usize },
}

/// HKDF-SHA256 extract-and-expand to a single 32-byte key.
pub(crate) fn hkdf_sha256(salt: Option<&[u8]>, ikm: &[u8], info: &[u8]) -> [u8; KEY_SIZE] {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = [0u8; KEY_SIZE];
    let Ok(()) = hkdf.expand(info, &mut okm) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    okm
}

/// The two independent secret shares a file key is derived from.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretShares {
    pre: [u8; SHARE_SIZE],
    post: [u8; SHARE_SIZE],
}

impl fmt::Debug for SecretShares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretShares")
            .field("pre", &"[REDACTED]")
            .field("post", &"[REDACTED]")
            .finish()
    }
}

impl SecretShares {
    /// Draw two independent shares from the OS RNG
    ///
    /// # Panics
    ///
    /// If the OS RNG is unavailable.
    pub fn generate() -> Self {
        Self {
            pre: random_array(),
            post: random_array(),
        }
    }

    pub fn from_parts(pre: [u8; SHARE_SIZE], post: [u8; SHARE_SIZE]) -> Self {
        Self { pre, post }
    }

    pub fn from_slices(pre: &[u8], post: &[u8]) -> Result<Self, FileKeyError> {
        Ok(Self {
            pre: share_from_slice(pre)?,
            post: share_from_slice(post)?,
        })
    }

    pub fn pre(&self) -> &[u8; SHARE_SIZE] {
        &self.pre
    }

    pub fn post(&self) -> &[u8; SHARE_SIZE] {
        &self.post
    }

    /// Derive the File Encryption Key.
    pub fn derive_fek(&self) -> SymmetricKey {
        let mut ikm = Zeroizing::new([0u8; SHARE_SIZE * 2]);
        ikm[..SHARE_SIZE].copy_from_slice(&self.pre);
        ikm[SHARE_SIZE..].copy_from_slice(&self.post);
        hkdf_sha256(None, &ikm[..], FEK_INFO).into()
    }

    /// Derive both the FEK and the MEK.
    pub fn derive_keys(&self) -> FileKeys {
        let fek = self.derive_fek();
        let mek = derive_mek(&fek);
        FileKeys { fek, mek }
    }
}

fn share_from_slice(data: &[u8]) -> Result<[u8; SHARE_SIZE], FileKeyError> {
    data.try_into().map_err(|_| FileKeyError::InvalidShareSize {
        expected: SHARE_SIZE,
        actual: data.len(),
    })
}

/// Derive the Metadata Encryption Key from a FEK.
pub fn derive_mek(fek: &SymmetricKey) -> SymmetricKey {
    hkdf_sha256(None, fek.bytes(), MEK_INFO).into()
}

/// FEK and MEK for one file
#[derive(Debug, Clone)]
pub struct FileKeys {
    pub fek: SymmetricKey,
    pub mek: SymmetricKey,
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_shares_are_independent() {
        let shares = SecretShares::generate();
        assert_ne!(shares.pre(), shares.post());
    }

    #[test]
    fn test_fek_is_deterministic() {
        let shares = SecretShares::from_parts([1u8; SHARE_SIZE], [2u8; SHARE_SIZE]);
        let again = SecretShares::from_parts([1u8; SHARE_SIZE], [2u8; SHARE_SIZE]);
        assert_eq!(shares.derive_fek(), again.derive_fek());
    }

    #[test]
    fn test_fek_depends_on_both_shares() {
        let base = SecretShares::from_parts([1u8; SHARE_SIZE], [2u8; SHARE_SIZE]);
        let other_pre = SecretShares::from_parts([3u8; SHARE_SIZE], [2u8; SHARE_SIZE]);
        let other_post = SecretShares::from_parts([1u8; SHARE_SIZE], [3u8; SHARE_SIZE]);
        let swapped = SecretShares::from_parts([2u8; SHARE_SIZE], [1u8; SHARE_SIZE]);

        let fek = base.derive_fek();
        assert_ne!(fek, other_pre.derive_fek());
        assert_ne!(fek, other_post.derive_fek());
        assert_ne!(fek, swapped.derive_fek());
    }

    #[test]
    fn test_fek_no_collisions_over_corpus() {
        let mut seen = HashSet::new();
        for _ in 0..512 {
            let fek = SecretShares::generate().derive_fek();
            assert!(seen.insert(*fek.bytes()));
        }
    }

    #[test]
    fn test_mek_is_distinct_from_fek() {
        let keys = SecretShares::generate().derive_keys();
        assert_ne!(keys.fek, keys.mek);
        assert_eq!(keys.mek, derive_mek(&keys.fek));
    }

    #[test]
    fn test_info_strings_separate_domains() {
        let ikm = [5u8; 64];
        assert_ne!(
            hkdf_sha256(None, &ikm, FEK_INFO),
            hkdf_sha256(None, &ikm, MEK_INFO)
        );
    }

    #[test]
    fn test_hkdf_known_answer() {
        // RFC 5869 test case 3: SHA-256, zero-length salt and info
        let ikm = [0x0bu8; 22];
        let okm = hkdf_sha256(None, &ikm, b"");
        assert_eq!(
            hex::encode(okm),
            "8da4e775a563c18f715f802a063c5a31b8a11f5c5ee1879ec3454e5f3c738d2d"
        );
    }

    #[test]
    fn test_from_slices_validates_size() {
        assert!(SecretShares::from_slices(&[0u8; 32], &[0u8; 32]).is_ok());
        assert_eq!(
            SecretShares::from_slices(&[0u8; 31], &[0u8; 32]),
            Err(FileKeyError::InvalidShareSize {
                expected: SHARE_SIZE,
                actual: 31
            })
        );
    }
}
