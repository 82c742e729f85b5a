use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

use crate::crypto::SharePayload;

/// Plaintext file metadata, sealed under the MEK before upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub filesize: u64,
}

/// Upload a sealed file.
///
/// The signatures cover `owner|hex(sha256(file_content))|hex(sha256(metadata))`.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    #[serde_as(as = "Base64")]
    pub file_content: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub metadata: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub metadata_nonce: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub pre_quantum_signature: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub post_quantum_signature: Vec<u8>,
}

impl std::fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field("file_content", &format!("{} bytes", self.file_content.len()))
            .field("metadata", &format!("{} bytes", self.metadata.len()))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {}

/// One entry of a file listing: a file the caller owns or one shared with them
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub file_id: i64,
    pub owner_username: String,
    #[serde_as(as = "Base64")]
    pub metadata: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub metadata_nonce: Vec<u8>,
    /// Milliseconds since the Unix epoch
    pub upload_timestamp: i64,
    pub is_owner: bool,
    pub shared_access: Option<SharePayload>,
    /// Recipients of this file; only populated for the owner
    #[serde(default)]
    pub shared_with: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    pub files: Vec<FileSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub file_id: i64,
}

#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub file_id: i64,
    pub owner_username: String,
    pub is_owner: bool,
    #[serde_as(as = "Base64")]
    pub file_content: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub metadata: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub metadata_nonce: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub pre_quantum_signature: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub post_quantum_signature: Vec<u8>,
    pub upload_timestamp: i64,
    pub shared_access: Option<SharePayload>,
}

impl std::fmt::Debug for DownloadResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadResponse")
            .field("file_id", &self.file_id)
            .field("owner_username", &self.owner_username)
            .field("is_owner", &self.is_owner)
            .field("file_content", &format!("{} bytes", self.file_content.len()))
            .field("shared", &self.shared_access.is_some())
            .finish_non_exhaustive()
    }
}

/// Grant another user access to a file the caller owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRequest {
    pub file_id: i64,
    pub shared_with_username: String,
    #[serde(flatten)]
    pub payload: SharePayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareResponse {
    pub access_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeRequest {
    pub file_id: i64,
    pub shared_with_username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeResponse {
    pub revoked: bool,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::{KeyBundlePrivate, SecretShares};

    #[test]
    fn test_share_request_is_flat() {
        let recipient = KeyBundlePrivate::generate();
        let payload =
            SharePayload::seal(&SecretShares::generate(), &[0u8; 12], &[1u8; 12], recipient.public())
                .unwrap();
        let request = ShareRequest {
            file_id: 3,
            shared_with_username: "bob".into(),
            payload,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["file_id"], 3);
        assert_eq!(json["shared_with_username"], "bob");
        assert!(json["ephemeral_public_key"].is_string());
        assert!(json["encrypted_fek_nonce"].is_string());

        let back: ShareRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_list_request_accepts_empty_object() {
        let request: ListRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, ListRequest {});
    }

    #[test]
    fn test_upload_request_rejects_bad_base64() {
        let json = r#"{"file_content":"!!","metadata":"","metadata_nonce":"","pre_quantum_signature":"","post_quantum_signature":""}"#;
        assert!(serde_json::from_str::<UploadRequest>(json).is_err());
    }
}
