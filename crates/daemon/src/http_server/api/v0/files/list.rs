use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use common::crypto::SharePayload;
use common::protocol::{FileSummary, ListRequest, ListResponse, LIST_PATH};

use crate::auth::{AuthRejection, Authenticated};
use crate::database::models::{FileRecord, SharedAccess};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

/// Files the caller owns, then files shared with the caller.
#[tracing::instrument(skip_all, fields(user = %auth.username))]
pub async fn handler(
    State(state): State<ServiceState>,
    auth: Authenticated,
) -> Result<impl IntoResponse, ListError> {
    let _: ListRequest = auth.json()?;
    let db = state.database();

    let mut files = Vec::new();

    for record in FileRecord::list_owned(auth.user_id, db).await? {
        let shared_with = SharedAccess::recipients(record.file_id, db).await?;
        files.push(summary(record, true, None, shared_with));
    }

    for record in FileRecord::list_shared_with(auth.user_id, db).await? {
        let shared_access = SharedAccess::for_recipient(record.file_id, auth.user_id, db)
            .await?
            .map(Into::into);
        files.push(summary(record, false, shared_access, Vec::new()));
    }

    Ok((StatusCode::OK, Json(ListResponse { files })).into_response())
}

fn summary(
    record: FileRecord,
    is_owner: bool,
    shared_access: Option<SharePayload>,
    shared_with: Vec<String>,
) -> FileSummary {
    FileSummary {
        file_id: record.file_id,
        owner_username: record.owner_username,
        metadata: record.metadata,
        metadata_nonce: record.metadata_nonce,
        upload_timestamp: record.upload_timestamp,
        is_owner,
        shared_access,
        shared_with,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error(transparent)]
    Request(#[from] AuthRejection),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ListError {
    fn into_response(self) -> Response {
        match self {
            ListError::Request(rejection) => rejection.into_response(),
            ListError::Database(e) => {
                tracing::error!("list failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error").into_response()
            }
        }
    }
}

impl ApiRequest for ListRequest {
    type Response = ListResponse;

    const PATH: &'static str = LIST_PATH;
}
