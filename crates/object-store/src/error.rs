//! Error types for the blob store.

/// Errors that can occur when working with the blob store.
#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    /// Object storage error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A conditional create found an object already at the path
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// Path is not a valid object location
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// S3 bucket not found - must be created before use
    #[error("S3 bucket '{0}' does not exist. Create it before starting the server.")]
    BucketNotFound(String),
}

/// Result type alias for blob store operations.
pub type Result<T> = std::result::Result<T, BlobStoreError>;
