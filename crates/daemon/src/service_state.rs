use std::sync::Arc;

use blob_store::{BlobStorage, BlobStoreError};

use crate::auth::RequestAuthenticator;
use crate::database::{Database, DatabaseSetupError};
use crate::service_config::Config;
use crate::upload::UploadLimits;

/// Shared handler state
#[derive(Clone)]
pub struct State {
    database: Database,
    blobs: BlobStorage,
    authenticator: Arc<RequestAuthenticator>,
    limits: UploadLimits,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        match config.sqlite_path {
            Some(ref path) => tracing::info!("Database path: {}", path.display()),
            None => tracing::info!("Database: in-memory"),
        }
        let database = Database::connect(config.sqlite_path.as_deref()).await?;

        tracing::debug!("ServiceState::from_config - opening blob store");
        let blobs = BlobStorage::new(config.blob_store.clone()).await?;

        let authenticator = Arc::new(RequestAuthenticator::new(
            config.auth_window_ms,
            config.reject_replays,
        ));

        Ok(Self::new(database, blobs, authenticator, config.limits))
    }

    pub fn new(
        database: Database,
        blobs: BlobStorage,
        authenticator: Arc<RequestAuthenticator>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            database,
            blobs,
            authenticator,
            limits,
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn blobs(&self) -> &BlobStorage {
        &self.blobs
    }

    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.authenticator
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }
}

impl AsRef<Database> for State {
    fn as_ref(&self) -> &Database {
        self.database()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("Database setup error: {0}")]
    DatabaseSetupError(#[from] DatabaseSetupError),
    #[error("Blob store error: {0}")]
    BlobStoreError(#[from] BlobStoreError),
}
