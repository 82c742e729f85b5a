use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use common::crypto::KeyBundleError;
use common::protocol::{BundleRequest, BundleResponse, BUNDLE_PATH};

use crate::auth::{AuthRejection, Authenticated};
use crate::database::models::User;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

/// Look up another user's published key bundle.
#[tracing::instrument(skip_all, fields(caller = %auth.username))]
pub async fn handler(
    State(state): State<ServiceState>,
    auth: Authenticated,
) -> Result<impl IntoResponse, BundleError> {
    let req: BundleRequest = auth.json()?;

    let user = User::by_username(&req.username, state.database())
        .await?
        .ok_or(BundleError::NotFound)?;
    let key_bundle = user.key_bundle()?;

    Ok((
        StatusCode::OK,
        Json(BundleResponse {
            username: user.username,
            key_bundle,
        }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error(transparent)]
    Request(#[from] AuthRejection),
    #[error("user not found")]
    NotFound,
    #[error("stored bundle is corrupt: {0}")]
    StoredBundle(#[from] KeyBundleError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for BundleError {
    fn into_response(self) -> Response {
        match self {
            BundleError::Request(rejection) => rejection.into_response(),
            BundleError::NotFound => (StatusCode::NOT_FOUND, "User not found").into_response(),
            other => {
                tracing::error!("bundle lookup failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error").into_response()
            }
        }
    }
}

impl ApiRequest for BundleRequest {
    type Response = BundleResponse;

    const PATH: &'static str = BUNDLE_PATH;
}
