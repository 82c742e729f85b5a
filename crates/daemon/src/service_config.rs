use std::net::SocketAddr;
use std::path::PathBuf;

use blob_store::ObjectStoreConfig;

use crate::auth::DEFAULT_AUTH_WINDOW_MS;
use crate::upload::UploadLimits;

/// Runtime configuration the service is started from
#[derive(Debug, Clone)]
pub struct Config {
    // http server configuration
    /// address for the API server to listen on
    pub listen_addr: SocketAddr,

    // data store configuration
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub sqlite_path: Option<PathBuf>,
    /// where ciphertext blobs are written
    pub blob_store: ObjectStoreConfig,

    // request handling
    pub limits: UploadLimits,
    pub auth_window_ms: i64,
    pub reject_replays: bool,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    /// Everything in memory, on an ephemeral local port.
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            sqlite_path: None,
            blob_store: ObjectStoreConfig::Memory,
            limits: UploadLimits::default(),
            auth_window_ms: DEFAULT_AUTH_WINDOW_MS,
            reject_replays: true,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }
}
