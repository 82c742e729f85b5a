use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use blob_store::ObjectStoreConfig;
use serde::{Deserialize, Serialize};

use crate::auth::DEFAULT_AUTH_WINDOW_MS;
use crate::service_config::Config as ServiceConfig;
use crate::upload::{UploadLimits, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_METADATA_SIZE};

pub const APP_NAME: &str = "strongbox";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// On-disk server configuration. Every field has a default, so an empty
/// file (or no file at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// SQLite database file; in-memory when unset
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    #[serde(default)]
    pub blob_store: ObjectStoreConfig,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    #[serde(default = "default_max_metadata_size")]
    pub max_metadata_size: usize,
    /// Accepted clock skew for signed requests
    #[serde(default = "default_auth_window_ms")]
    pub auth_window_ms: i64,
    #[serde(default = "default_reject_replays")]
    pub reject_replays: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5080))
}

fn default_max_file_size() -> usize {
    DEFAULT_MAX_FILE_SIZE
}

fn default_max_metadata_size() -> usize {
    DEFAULT_MAX_METADATA_SIZE
}

fn default_auth_window_ms() -> i64 {
    DEFAULT_AUTH_WINDOW_MS
}

fn default_reject_replays() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            sqlite_path: None,
            blob_store: ObjectStoreConfig::default(),
            max_file_size: default_max_file_size(),
            max_metadata_size: default_max_metadata_size(),
            auth_window_ms: default_auth_window_ms(),
            reject_replays: default_reject_replays(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Resolve into the runtime configuration the service starts from.
    pub fn to_service_config(&self) -> Result<ServiceConfig, StateError> {
        let log_level = tracing::Level::from_str(&self.log_level)
            .map_err(|_| StateError::InvalidLogLevel(self.log_level.clone()))?;
        if self.auth_window_ms <= 0 {
            return Err(StateError::InvalidAuthWindow(self.auth_window_ms));
        }

        Ok(ServiceConfig {
            listen_addr: self.listen_addr,
            sqlite_path: self.sqlite_path.clone(),
            blob_store: self.blob_store.clone(),
            limits: UploadLimits {
                max_file_size: self.max_file_size,
                max_metadata_size: self.max_metadata_size,
            },
            auth_window_ms: self.auth_window_ms,
            reject_replays: self.reject_replays,
            log_level,
            log_dir: self.log_dir.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path the configuration was (or would have been) read from
    pub config_path: PathBuf,
    pub config: AppConfig,
}

impl AppState {
    /// Default config directory for this platform.
    pub fn config_dir() -> Result<PathBuf, StateError> {
        directories::ProjectDirs::from("", "", APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or(StateError::NoHomeDirectory)
    }

    /// Load configuration from `custom_path`, or from the platform config
    /// directory when no path is given.
    ///
    /// An explicit path must exist. A missing default file means defaults.
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let (config_path, required) = match custom_path {
            Some(path) => (path, true),
            None => (Self::config_dir()?.join(CONFIG_FILE_NAME), false),
        };

        if !config_path.exists() {
            if required {
                return Err(StateError::MissingFile(config_path.display().to_string()));
            }
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Self {
                config_path,
                config: AppConfig::default(),
            });
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("auth window must be positive, got {0}")]
    InvalidAuthWindow(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:5080");
        assert_eq!(config.max_file_size, 100 * 1024 * 1024);
        assert_eq!(config.auth_window_ms, 300_000);
        assert!(config.reject_replays);
    }

    #[test]
    fn test_full_config() {
        let config: AppConfig = toml::from_str(
            r#"
            listen_addr = "0.0.0.0:9000"
            sqlite_path = "/var/lib/strongbox/db.sqlite"
            max_file_size = 1024
            auth_window_ms = 60000
            reject_replays = false
            log_level = "debug"

            [blob_store]
            type = "local"
            path = "/var/lib/strongbox/blobs"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(
            config.blob_store,
            ObjectStoreConfig::Local {
                path: PathBuf::from("/var/lib/strongbox/blobs")
            }
        );

        let service = config.to_service_config().unwrap();
        assert_eq!(service.log_level, tracing::Level::DEBUG);
        assert_eq!(service.limits.max_file_size, 1024);
        assert_eq!(service.limits.max_metadata_size, DEFAULT_MAX_METADATA_SIZE);
        assert!(!service.reject_replays);
    }

    #[test]
    fn test_bad_log_level() {
        let config = AppConfig {
            log_level: "chatty".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.to_service_config(),
            Err(StateError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strongbox.toml");

        assert!(matches!(
            AppState::load(Some(path.clone())),
            Err(StateError::MissingFile(_))
        ));

        fs::write(&path, "listen_addr = \"127.0.0.1:6000\"\n").unwrap();
        let state = AppState::load(Some(path.clone())).unwrap();
        assert_eq!(state.config_path, path);
        assert_eq!(state.config.listen_addr.port(), 6000);
    }
}
