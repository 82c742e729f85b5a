//! Object storage backend abstraction (S3/MinIO/local filesystem/memory).

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::aws::{AmazonS3Builder, S3ConditionalPut};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutMode, PutOptions};
use serde::{Deserialize, Serialize};

use crate::error::{BlobStoreError, Result};

/// Configuration for the object storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

/// Wrapper around different object storage backends.
#[derive(Debug, Clone)]
pub struct BlobStorage {
    inner: Arc<dyn ObjectStore>,
}

impl BlobStorage {
    /// Create a new storage backend from configuration.
    pub async fn new(config: ObjectStoreConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config {
            ObjectStoreConfig::Memory => Arc::new(InMemory::new()),

            ObjectStoreConfig::Local { path } => {
                // Ensure directory exists
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| BlobStoreError::InvalidConfig(e.to_string()))?,
                )
            }

            ObjectStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"))
                    // create-if-absent is sent as If-None-Match
                    .with_conditional_put(S3ConditionalPut::ETagMatch);

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| BlobStoreError::InvalidConfig(e.to_string()))?,
                );

                // Fail fast if the bucket doesn't exist
                {
                    use futures::TryStreamExt;
                    let prefix = ObjectPath::from("");
                    let mut stream = store.list(Some(&prefix));
                    match stream.try_next().await {
                        Ok(_) => {}
                        Err(object_store::Error::NotFound { .. }) => {
                            return Err(BlobStoreError::BucketNotFound(bucket.clone()));
                        }
                        Err(e) => {
                            let msg = e.to_string();
                            if msg.contains("NoSuchBucket")
                                || msg.contains("bucket") && msg.contains("not")
                            {
                                return Err(BlobStoreError::BucketNotFound(bucket.clone()));
                            }
                            return Err(e.into());
                        }
                    }
                }

                store
            }
        };

        tracing::debug!(?config, "blob storage initialized");
        Ok(Self { inner })
    }

    /// Create an in-memory storage backend.
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
        }
    }

    fn object_path(path: &str) -> Result<ObjectPath> {
        ObjectPath::parse(path).map_err(|_| BlobStoreError::InvalidPath(path.to_string()))
    }

    /// Write `data` at `path` only if nothing is stored there yet.
    ///
    /// Returns [`BlobStoreError::AlreadyExists`] when the path is taken;
    /// the existing object is left untouched.
    pub async fn create(&self, path: &str, data: Bytes) -> Result<()> {
        let location = Self::object_path(path)?;
        let opts = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };
        match self.inner.put_opts(&location, data.into(), opts).await {
            Ok(_) => Ok(()),
            Err(object_store::Error::AlreadyExists { .. }) => {
                Err(BlobStoreError::AlreadyExists(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read the object at `path`, if any.
    pub async fn get(&self, path: &str) -> Result<Option<Bytes>> {
        let location = Self::object_path(path)?;
        match self.inner.get(&location).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(bytes))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the object at `path`. Deleting a missing object succeeds.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let location = Self::object_path(path)?;
        match self.inner.delete(&location).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// List every object path under `prefix`.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        use futures::TryStreamExt;

        let prefix = Self::object_path(prefix)?;
        let items: Vec<_> = self.inner.list(Some(&prefix)).try_collect().await?;

        Ok(items
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = BlobStorage::memory();

        let path = "files/abc123.bin";
        let data = Bytes::from("hello world");

        storage.create(path, data.clone()).await.unwrap();
        let retrieved = storage.get(path).await.unwrap().unwrap();
        assert_eq!(retrieved, data);

        let paths = storage.list("files").await.unwrap();
        assert_eq!(paths, vec![path.to_string()]);

        storage.delete(path).await.unwrap();
        assert!(storage.get(path).await.unwrap().is_none());
        assert!(storage.list("files").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_does_not_overwrite() {
        let storage = BlobStorage::memory();
        let path = "files/taken.bin";

        storage.create(path, Bytes::from("first")).await.unwrap();
        let err = storage.create(path, Bytes::from("second")).await.unwrap_err();
        assert!(matches!(err, BlobStoreError::AlreadyExists(p) if p == path));

        let retrieved = storage.get(path).await.unwrap().unwrap();
        assert_eq!(retrieved, Bytes::from("first"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let storage = BlobStorage::memory();
        storage.delete("files/never-written.bin").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_path() {
        let storage = BlobStorage::memory();
        let err = storage
            .create("files/../escape.bin", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BlobStoreError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_local_storage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = ObjectStoreConfig::Local {
            path: temp_dir.path().to_path_buf(),
        };

        let storage = BlobStorage::new(config).await.unwrap();

        let path = "files/def456.bin";
        let data = Bytes::from("test data");

        storage.create(path, data.clone()).await.unwrap();
        let retrieved = storage.get(path).await.unwrap().unwrap();
        assert_eq!(retrieved, data);

        // Verify file exists on disk
        let file_path = temp_dir.path().join("files").join("def456.bin");
        assert!(file_path.exists());

        let err = storage.create(path, Bytes::from("again")).await.unwrap_err();
        assert!(matches!(err, BlobStoreError::AlreadyExists(_)));
    }
}
