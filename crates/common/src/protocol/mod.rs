//! Wire protocol shared by the client and the server
//!
//! Every API call is a JSON `POST` under `/api/v0` carrying four headers:
//! the caller's username, a millisecond timestamp, and the two halves of a
//! [`HybridSignature`] over the request canonical message
//!
//! ```text
//! username|timestamp|METHOD|path|body
//! ```
//!
//! where `path` excludes the query string and `body` is the exact request
//! body bytes. The signature may instead travel combined in a single
//! `X-Signature` header as `base64(pre).base64(post)`.

mod files;
mod identity;

pub use files::{
    DownloadRequest, DownloadResponse, FileMetadata, FileSummary, ListRequest, ListResponse,
    RevokeRequest, RevokeResponse, ShareRequest, ShareResponse, UploadRequest, UploadResponse,
};
pub use identity::{BundleRequest, BundleResponse, RegisterRequest, RegisterResponse};

use crate::crypto::{canonical_message, HybridSignature, KeyBundlePrivate};

pub const USERNAME_HEADER: &str = "x-username";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const PRE_QUANTUM_SIGNATURE_HEADER: &str = "x-signature-pre-quantum";
pub const POST_QUANTUM_SIGNATURE_HEADER: &str = "x-signature-post-quantum";
pub const COMBINED_SIGNATURE_HEADER: &str = "x-signature";

pub const REGISTER_PATH: &str = "/api/v0/identity/register";
pub const BUNDLE_PATH: &str = "/api/v0/identity/bundle";
pub const UPLOAD_PATH: &str = "/api/v0/files/upload";
pub const LIST_PATH: &str = "/api/v0/files/list";
pub const DOWNLOAD_PATH: &str = "/api/v0/files/download";
pub const SHARE_PATH: &str = "/api/v0/files/share";
pub const REVOKE_PATH: &str = "/api/v0/files/revoke";

/// Canonical message a request signature covers.
pub fn request_message(
    username: &str,
    timestamp_ms: i64,
    method: &str,
    path: &str,
    body: &[u8],
) -> Vec<u8> {
    let timestamp = timestamp_ms.to_string();
    let method = method.to_ascii_uppercase();
    canonical_message(&[
        username.as_bytes(),
        timestamp.as_bytes(),
        method.as_bytes(),
        path.as_bytes(),
        body,
    ])
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The authentication headers of one signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub username: String,
    pub timestamp_ms: i64,
    pub signature: HybridSignature,
}

impl AuthHeaders {
    /// Sign a request as `username`.
    pub fn sign(
        username: &str,
        timestamp_ms: i64,
        method: &str,
        path: &str,
        body: &[u8],
        bundle: &KeyBundlePrivate,
    ) -> Self {
        let message = request_message(username, timestamp_ms, method, path, body);
        Self {
            username: username.to_string(),
            timestamp_ms,
            signature: HybridSignature::sign(&message, bundle),
        }
    }

    /// Header name/value pairs, with the signature split across two headers.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;

        vec![
            (USERNAME_HEADER, self.username.clone()),
            (TIMESTAMP_HEADER, self.timestamp_ms.to_string()),
            (
                PRE_QUANTUM_SIGNATURE_HEADER,
                STANDARD.encode(&self.signature.pre_quantum),
            ),
            (
                POST_QUANTUM_SIGNATURE_HEADER,
                STANDARD.encode(&self.signature.post_quantum),
            ),
        ]
    }
}
