//! Server-side upload ordering
//!
//! An authenticated upload moves through
//!
//! ```text
//! Authenticated ─► SignatureVerified ─► Stored ─► Recorded
//! ```
//!
//! and any step may end in `Failed`. The blob is always written before the
//! record is inserted; if the insert fails the blob is deleted again, so a
//! record exists exactly when its blob does.

use axum::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use blob_store::{BlobStorage, BlobStoreError};
use common::crypto::{file_message, HybridSignature, NONCE_SIZE};
use common::protocol::UploadRequest;

use crate::auth::Authenticated;
use crate::database::models::{FileRecord, NewFileRecord};
use crate::database::Database;

/// Default ciphertext limit (100 MiB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 100 * 1024 * 1024;
/// Encrypted metadata limit (64 KiB)
pub const DEFAULT_MAX_METADATA_SIZE: usize = 64 * 1024;
/// Fresh paths tried before giving up on a write
pub const MAX_PATH_ATTEMPTS: usize = 5;

/// Where ciphertext blobs go
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write only if `path` is free. A taken path is [`BlobStoreError::AlreadyExists`].
    async fn put_if_absent(&self, path: &str, data: Bytes) -> Result<(), BlobStoreError>;
    async fn delete(&self, path: &str) -> Result<(), BlobStoreError>;
}

/// Where file records go
#[async_trait]
pub trait FileRecordStore: Send + Sync {
    async fn insert(&self, record: &NewFileRecord) -> Result<i64, sqlx::Error>;
}

#[async_trait]
impl BlobStore for BlobStorage {
    async fn put_if_absent(&self, path: &str, data: Bytes) -> Result<(), BlobStoreError> {
        self.create(path, data).await
    }

    async fn delete(&self, path: &str) -> Result<(), BlobStoreError> {
        BlobStorage::delete(self, path).await
    }
}

#[async_trait]
impl FileRecordStore for Database {
    async fn insert(&self, record: &NewFileRecord) -> Result<i64, sqlx::Error> {
        FileRecord::create(record, self).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_file_size: usize,
    pub max_metadata_size: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_metadata_size: DEFAULT_MAX_METADATA_SIZE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{what} is {size} bytes, limit is {limit}")]
    PayloadTooLarge {
        what: &'static str,
        size: usize,
        limit: usize,
    },
    #[error("invalid upload: {0}")]
    InvalidRequest(&'static str),
    #[error("file signature invalid")]
    SignatureInvalid,
    #[error("storage write failed: {0}")]
    StorageWriteFailed(BlobStoreError),
    #[error("no free storage path after {0} attempts")]
    StoragePathExhausted(usize),
    #[error("record insert failed: {0}")]
    RecordInsertFailed(sqlx::Error),
}

/// A successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub file_id: i64,
    pub storage_path: String,
}

pub struct UploadOrchestrator<'a, B, R> {
    blobs: &'a B,
    records: &'a R,
    limits: UploadLimits,
}

fn storage_path() -> String {
    format!("files/{}.bin", Uuid::new_v4())
}

impl<'a, B: BlobStore, R: FileRecordStore> UploadOrchestrator<'a, B, R> {
    pub fn new(blobs: &'a B, records: &'a R, limits: UploadLimits) -> Self {
        Self {
            blobs,
            records,
            limits,
        }
    }

    /// Run an upload for an already authenticated caller.
    pub async fn upload(
        &self,
        caller: &Authenticated,
        request: UploadRequest,
        upload_timestamp: i64,
    ) -> Result<Recorded, UploadError> {
        self.validate(&request)?;

        let message = file_message(&caller.username, &request.file_content, &request.metadata);
        HybridSignature::from_parts(
            request.pre_quantum_signature.clone(),
            request.post_quantum_signature.clone(),
        )
        .verify(&message, &caller.bundle)
        .map_err(|_| UploadError::SignatureInvalid)?;
        tracing::debug!(user = %caller.username, "upload signature verified");

        let UploadRequest {
            file_content,
            metadata,
            metadata_nonce,
            pre_quantum_signature,
            post_quantum_signature,
        } = request;

        let storage_path = self.store(Bytes::from(file_content)).await?;
        tracing::debug!(user = %caller.username, %storage_path, "upload stored");

        let record = NewFileRecord {
            owner_user_id: caller.user_id,
            storage_path: storage_path.clone(),
            metadata,
            metadata_nonce,
            pre_quantum_signature,
            post_quantum_signature,
            upload_timestamp,
        };

        let file_id = match self.records.insert(&record).await {
            Ok(file_id) => file_id,
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&storage_path).await {
                    tracing::error!(%storage_path, "failed to remove orphaned blob: {}", cleanup);
                }
                return Err(UploadError::RecordInsertFailed(e));
            }
        };
        tracing::debug!(user = %caller.username, file_id, "upload recorded");

        Ok(Recorded {
            file_id,
            storage_path,
        })
    }

    fn validate(&self, request: &UploadRequest) -> Result<(), UploadError> {
        if request.file_content.len() > self.limits.max_file_size {
            return Err(UploadError::PayloadTooLarge {
                what: "file_content",
                size: request.file_content.len(),
                limit: self.limits.max_file_size,
            });
        }
        if request.metadata.len() > self.limits.max_metadata_size {
            return Err(UploadError::PayloadTooLarge {
                what: "metadata",
                size: request.metadata.len(),
                limit: self.limits.max_metadata_size,
            });
        }
        if request.metadata_nonce.len() != NONCE_SIZE {
            return Err(UploadError::InvalidRequest("metadata_nonce must be 12 bytes"));
        }
        Ok(())
    }

    async fn store(&self, data: Bytes) -> Result<String, UploadError> {
        for _ in 0..MAX_PATH_ATTEMPTS {
            let path = storage_path();
            match self.blobs.put_if_absent(&path, data.clone()).await {
                Ok(()) => return Ok(path),
                Err(BlobStoreError::AlreadyExists(_)) => {
                    tracing::debug!(%path, "storage path taken, retrying");
                }
                Err(e) => return Err(UploadError::StorageWriteFailed(e)),
            }
        }
        Err(UploadError::StoragePathExhausted(MAX_PATH_ATTEMPTS))
    }
}
