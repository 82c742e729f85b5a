/**
 * Cryptographic types and operations.
 *  - Hybrid identity key bundles
 *  - Per-file key derivation and envelope encryption
 *  - Dual pre/post-quantum signatures
 *  - Key rewrapping for sharing
 */
pub mod crypto;
/**
 * Wire types, header names and the canonical
 *  request message shared by client and server.
 */
pub mod protocol;
/**
 * Client-side sealing and opening of files.
 */
pub mod sealer;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::crypto::{
        HybridSignature, KeyBundleError, KeyBundlePrivate, KeyBundlePublic, SecretShares,
        SharePayload, SignatureError,
    };
    pub use crate::protocol::{AuthHeaders, FileMetadata};
    pub use crate::sealer::{FileKeyMaterial, FileSealer, OpenedFile, SealedFile, SealerError};
    pub use crate::version::build_info;
}
