use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use common::protocol::{now_millis, UploadRequest, UploadResponse, UPLOAD_PATH};

use crate::auth::{AuthRejection, Authenticated};
use crate::http_server::api::client::ApiRequest;
use crate::upload::{UploadError, UploadOrchestrator};
use crate::ServiceState;

#[tracing::instrument(skip_all, fields(user = %auth.username))]
pub async fn handler(
    State(state): State<ServiceState>,
    auth: Authenticated,
) -> Result<impl IntoResponse, UploadHandlerError> {
    let request: UploadRequest = auth.json()?;

    let orchestrator = UploadOrchestrator::new(state.blobs(), state.database(), state.limits());
    let recorded = orchestrator.upload(&auth, request, now_millis()).await?;
    tracing::info!(file_id = recorded.file_id, "file uploaded");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            file_id: recorded.file_id,
        }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum UploadHandlerError {
    #[error(transparent)]
    Request(#[from] AuthRejection),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl IntoResponse for UploadHandlerError {
    fn into_response(self) -> Response {
        match self {
            UploadHandlerError::Request(rejection) => rejection.into_response(),
            UploadHandlerError::Upload(e) => match e {
                UploadError::PayloadTooLarge { .. } => {
                    (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response()
                }
                UploadError::InvalidRequest(msg) => {
                    (StatusCode::BAD_REQUEST, format!("Bad request: {}", msg)).into_response()
                }
                UploadError::SignatureInvalid => {
                    tracing::debug!("upload rejected: file signature invalid");
                    let msg = serde_json::json!({"msg": "unauthorized"});
                    (StatusCode::UNAUTHORIZED, Json(msg)).into_response()
                }
                UploadError::StorageWriteFailed(_)
                | UploadError::StoragePathExhausted(_)
                | UploadError::RecordInsertFailed(_) => {
                    tracing::error!("upload failed: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error").into_response()
                }
            },
        }
    }
}

impl ApiRequest for UploadRequest {
    type Response = UploadResponse;

    const PATH: &'static str = UPLOAD_PATH;
}
