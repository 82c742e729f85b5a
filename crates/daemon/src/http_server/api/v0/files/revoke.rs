use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use common::protocol::{RevokeRequest, RevokeResponse, REVOKE_PATH};

use crate::auth::{AuthRejection, Authenticated};
use crate::database::models::{FileRecord, SharedAccess, User};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

/// Delete a grant. The file key is not rotated, so a recipient who already
/// downloaded the file can still read that copy.
#[tracing::instrument(skip_all, fields(owner = %auth.username))]
pub async fn handler(
    State(state): State<ServiceState>,
    auth: Authenticated,
) -> Result<impl IntoResponse, RevokeError> {
    let req: RevokeRequest = auth.json()?;
    let db = state.database();

    let record = FileRecord::get_owned(req.file_id, auth.user_id, db)
        .await?
        .ok_or(RevokeError::FileNotFound)?;

    let revoked = match User::by_username(&req.shared_with_username, db).await? {
        Some(recipient) => {
            SharedAccess::revoke(auth.user_id, recipient.user_id, record.file_id, db).await?
        }
        None => false,
    };
    tracing::info!(file_id = record.file_id, revoked, "share revoked");

    Ok((StatusCode::OK, Json(RevokeResponse { revoked })).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum RevokeError {
    #[error(transparent)]
    Request(#[from] AuthRejection),
    #[error("file not found")]
    FileNotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for RevokeError {
    fn into_response(self) -> Response {
        match self {
            RevokeError::Request(rejection) => rejection.into_response(),
            RevokeError::FileNotFound => (StatusCode::NOT_FOUND, "File not found").into_response(),
            RevokeError::Database(e) => {
                tracing::error!("revoke failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error").into_response()
            }
        }
    }
}

impl ApiRequest for RevokeRequest {
    type Response = RevokeResponse;

    const PATH: &'static str = REVOKE_PATH;
}
