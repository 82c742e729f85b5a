use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use common::crypto::{SharePayload, EPHEMERAL_KEY_SIZE, NONCE_SIZE};
use common::protocol::{ShareRequest, ShareResponse, SHARE_PATH};

use crate::auth::{AuthRejection, Authenticated};
use crate::database::models::{is_unique_violation, FileRecord, SharedAccess, User};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

/// Store a share payload granting another user access to an owned file.
///
/// The server only checks shapes and ownership; it cannot open the payload.
#[tracing::instrument(skip_all, fields(owner = %auth.username))]
pub async fn handler(
    State(state): State<ServiceState>,
    auth: Authenticated,
) -> Result<impl IntoResponse, ShareError> {
    let req: ShareRequest = auth.json()?;
    let db = state.database();

    // Unowned and nonexistent files look the same
    let record = FileRecord::get_owned(req.file_id, auth.user_id, db)
        .await?
        .ok_or(ShareError::FileNotFound)?;
    let recipient = User::by_username(&req.shared_with_username, db)
        .await?
        .ok_or(ShareError::RecipientNotFound)?;

    if recipient.user_id == auth.user_id {
        return Err(ShareError::SelfShare);
    }
    check_payload(&req.payload)?;
    if req.payload.metadata_nonce != record.metadata_nonce {
        return Err(ShareError::InvalidPayload("metadata_nonce does not match file"));
    }

    let access_id = SharedAccess::create(
        auth.user_id,
        recipient.user_id,
        record.file_id,
        &req.payload,
        db,
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ShareError::AlreadyShared
        } else {
            ShareError::Database(e)
        }
    })?;
    tracing::info!(
        file_id = record.file_id,
        recipient = %recipient.username,
        access_id,
        "file shared"
    );

    Ok((StatusCode::CREATED, Json(ShareResponse { access_id })).into_response())
}

fn check_payload(payload: &SharePayload) -> Result<(), ShareError> {
    if payload.ephemeral_public_key.len() != EPHEMERAL_KEY_SIZE {
        return Err(ShareError::InvalidPayload("ephemeral_public_key must be 32 bytes"));
    }
    let nonces = [
        &payload.encrypted_fek_nonce,
        &payload.encrypted_mek_nonce,
        &payload.file_content_nonce,
        &payload.metadata_nonce,
    ];
    if nonces.iter().any(|n| n.len() != NONCE_SIZE) {
        return Err(ShareError::InvalidPayload("nonces must be 12 bytes"));
    }
    if payload.encrypted_fek.is_empty() || payload.encrypted_mek.is_empty() {
        return Err(ShareError::InvalidPayload("wrapped shares must not be empty"));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error(transparent)]
    Request(#[from] AuthRejection),
    #[error("file not found")]
    FileNotFound,
    #[error("recipient not found")]
    RecipientNotFound,
    #[error("cannot share a file with its owner")]
    SelfShare,
    #[error("invalid share payload: {0}")]
    InvalidPayload(&'static str),
    #[error("file already shared with recipient")]
    AlreadyShared,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        match self {
            ShareError::Request(rejection) => rejection.into_response(),
            ShareError::FileNotFound => (StatusCode::NOT_FOUND, "File not found").into_response(),
            ShareError::RecipientNotFound => {
                (StatusCode::NOT_FOUND, "Recipient not found").into_response()
            }
            ShareError::SelfShare => {
                (StatusCode::BAD_REQUEST, "Cannot share a file with yourself").into_response()
            }
            ShareError::InvalidPayload(msg) => {
                (StatusCode::BAD_REQUEST, format!("Bad request: {}", msg)).into_response()
            }
            ShareError::AlreadyShared => {
                (StatusCode::CONFLICT, "File already shared with recipient").into_response()
            }
            ShareError::Database(e) => {
                tracing::error!("share failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error").into_response()
            }
        }
    }
}

impl ApiRequest for ShareRequest {
    type Response = ShareResponse;

    const PATH: &'static str = SHARE_PATH;
}
