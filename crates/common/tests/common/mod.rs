//! Shared test utilities for protocol integration tests
#![allow(dead_code)]

use ::common::prelude::*;
use ::common::protocol::{DownloadResponse, UploadRequest};

/// A registered user as the server would see them
pub struct Party {
    pub username: String,
    pub bundle: KeyBundlePrivate,
}

impl Party {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            bundle: KeyBundlePrivate::generate(),
        }
    }

    /// The public bundle as it round-trips through the server's storage.
    pub fn published(&self) -> KeyBundlePublic {
        KeyBundlePublic::from_json(&self.bundle.public().to_json()).unwrap()
    }
}

/// Build the download response the server would return for an upload.
pub fn served(
    owner: &Party,
    request: &UploadRequest,
    is_owner: bool,
    shared_access: Option<SharePayload>,
) -> DownloadResponse {
    DownloadResponse {
        file_id: 1,
        owner_username: owner.username.clone(),
        is_owner,
        file_content: request.file_content.clone(),
        metadata: request.metadata.clone(),
        metadata_nonce: request.metadata_nonce.clone(),
        pre_quantum_signature: request.pre_quantum_signature.clone(),
        post_quantum_signature: request.post_quantum_signature.clone(),
        upload_timestamp: 1_700_000_000_000,
        shared_access,
    }
}
