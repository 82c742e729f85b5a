//! Object storage for ciphertext blobs
//!
//! A thin wrapper over [`object_store`] that gives the server the handful of
//! operations it needs: atomic create-if-absent writes, reads, deletes and
//! existence checks. Backends are selected by [`ObjectStoreConfig`]: in-memory,
//! local filesystem, or any S3-compatible service.
//!
//! The store never sees plaintext. Paths are chosen by the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use strongbox_object_store::{BlobStorage, ObjectStoreConfig};
//!
//! # async fn example() -> Result<(), strongbox_object_store::BlobStoreError> {
//! let storage = BlobStorage::new(ObjectStoreConfig::Local {
//!     path: "/tmp/strongbox-blobs".into(),
//! })
//! .await?;
//!
//! storage.create("files/example.bin", Bytes::from_static(b"ciphertext")).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod storage;

pub use error::{BlobStoreError, Result};
pub use storage::{BlobStorage, ObjectStoreConfig};
