use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use common::protocol::{RegisterRequest, RegisterResponse, REGISTER_PATH};

use crate::auth::SelfSigned;
use crate::database::models::{is_unique_violation, User};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

/// Publish a username and key bundle. The request must be signed by the
/// private half of the bundle it carries.
#[tracing::instrument(skip_all, fields(username = %signed.request.username))]
pub async fn handler(
    State(state): State<ServiceState>,
    signed: SelfSigned,
) -> Result<impl IntoResponse, RegisterError> {
    let RegisterRequest {
        username,
        key_bundle,
    } = signed.request;

    if username.is_empty() {
        return Err(RegisterError::InvalidUsername);
    }

    let user = User::create(&username, &key_bundle, state.database())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RegisterError::UsernameTaken(username.clone())
            } else {
                RegisterError::Database(e)
            }
        })?;
    tracing::info!(user_id = user.user_id, "registered user");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.user_id,
            username: user.username,
        }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("username must not be empty")]
    InvalidUsername,
    #[error("username already registered: {0}")]
    UsernameTaken(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for RegisterError {
    fn into_response(self) -> Response {
        match self {
            RegisterError::InvalidUsername => {
                (StatusCode::BAD_REQUEST, "Invalid username").into_response()
            }
            RegisterError::UsernameTaken(_) => {
                (StatusCode::CONFLICT, "Username already registered").into_response()
            }
            RegisterError::Database(e) => {
                tracing::error!("register failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error").into_response()
            }
        }
    }
}

impl ApiRequest for RegisterRequest {
    type Response = RegisterResponse;

    const PATH: &'static str = REGISTER_PATH;
}
