use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use blob_store::BlobStoreError;
use common::crypto::SharePayload;
use common::protocol::{DownloadRequest, DownloadResponse, DOWNLOAD_PATH};

use crate::auth::{AuthRejection, Authenticated};
use crate::database::models::{FileRecord, SharedAccess};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

/// Return a file's ciphertext to its owner, or to a user it was shared
/// with together with their wrapped keys. Anyone else gets a 404.
#[tracing::instrument(skip_all, fields(user = %auth.username))]
pub async fn handler(
    State(state): State<ServiceState>,
    auth: Authenticated,
) -> Result<impl IntoResponse, DownloadError> {
    let req: DownloadRequest = auth.json()?;
    let db = state.database();

    let record = FileRecord::get(req.file_id, db)
        .await?
        .ok_or(DownloadError::NotFound)?;

    let is_owner = record.owner_user_id == auth.user_id;
    let shared_access: Option<SharePayload> = if is_owner {
        None
    } else {
        let access = SharedAccess::for_recipient(record.file_id, auth.user_id, db)
            .await?
            .ok_or(DownloadError::NotFound)?;
        Some(access.into())
    };

    let file_content = state
        .blobs()
        .get(&record.storage_path)
        .await?
        .ok_or_else(|| DownloadError::MissingBlob(record.storage_path.clone()))?;
    tracing::debug!(file_id = record.file_id, is_owner, "serving file");

    Ok((
        StatusCode::OK,
        Json(DownloadResponse {
            file_id: record.file_id,
            owner_username: record.owner_username,
            is_owner,
            file_content: file_content.to_vec(),
            metadata: record.metadata,
            metadata_nonce: record.metadata_nonce,
            pre_quantum_signature: record.pre_quantum_signature,
            post_quantum_signature: record.post_quantum_signature,
            upload_timestamp: record.upload_timestamp,
            shared_access,
        }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Request(#[from] AuthRejection),
    #[error("file not found")]
    NotFound,
    #[error("record points at missing blob {0}")]
    MissingBlob(String),
    #[error("storage error: {0}")]
    Storage(#[from] BlobStoreError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for DownloadError {
    fn into_response(self) -> Response {
        match self {
            DownloadError::Request(rejection) => rejection.into_response(),
            DownloadError::NotFound => (StatusCode::NOT_FOUND, "File not found").into_response(),
            other => {
                tracing::error!("download failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error").into_response()
            }
        }
    }
}

impl ApiRequest for DownloadRequest {
    type Response = DownloadResponse;

    const PATH: &'static str = DOWNLOAD_PATH;
}
