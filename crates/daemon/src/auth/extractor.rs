use axum::async_trait;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{FromRequest, OriginalUri, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;

use common::crypto::KeyBundlePublic;
use common::protocol::{now_millis, RegisterRequest};

use super::AuthError;
use crate::ServiceState;

/// A request whose signature checked out against the caller's stored bundle
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user_id: i64,
    pub username: String,
    pub bundle: KeyBundlePublic,
    /// The exact body bytes the signature covered
    pub body: Bytes,
}

impl Authenticated {
    /// Parse the signed body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AuthRejection> {
        serde_json::from_slice(&self.body).map_err(|e| AuthRejection::BadRequest(e.to_string()))
    }
}

/// A registration request signed by the keys it registers
#[derive(Debug, Clone)]
pub struct SelfSigned {
    pub request: RegisterRequest,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthRejection {
    #[error("unauthorized: {0}")]
    Unauthorized(AuthError),
    #[error("invalid body: {0}")]
    Body(#[from] BytesRejection),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("authentication failed: {0}")]
    Internal(AuthError),
}

impl From<AuthError> for AuthRejection {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Lookup(_) => AuthRejection::Internal(err),
            _ => AuthRejection::Unauthorized(err),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::Unauthorized(reason) => {
                tracing::debug!(%reason, "rejected request");
                let msg = serde_json::json!({"msg": "unauthorized"});
                (StatusCode::UNAUTHORIZED, Json(msg)).into_response()
            }
            AuthRejection::Body(rejection) => rejection.into_response(),
            AuthRejection::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, format!("Bad request: {}", msg)).into_response()
            }
            AuthRejection::Internal(e) => {
                tracing::error!("authentication error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error").into_response()
            }
        }
    }
}

/// Path the client signed. Nested routers see the path with their prefix
/// stripped, so prefer the original URI.
fn request_path(req: &Request) -> String {
    req.extensions()
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.path().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned())
}

#[async_trait]
impl FromRequest<ServiceState> for Authenticated {
    type Rejection = AuthRejection;

    async fn from_request(req: Request, state: &ServiceState) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        let path = request_path(&req);
        let headers = req.headers().clone();
        let body = Bytes::from_request(req, state).await?;

        let now = now_millis();
        let verified = state
            .authenticator()
            .receive(&headers)
            .parse_headers(now)?
            .resolve_user(state.database())
            .await?
            .check_signature(&method, &path, &body)?
            .finish(now)?;

        Ok(Authenticated {
            user_id: verified.subject,
            username: verified.username,
            bundle: verified.bundle,
            body,
        })
    }
}

#[async_trait]
impl FromRequest<ServiceState> for SelfSigned {
    type Rejection = AuthRejection;

    async fn from_request(req: Request, state: &ServiceState) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        let path = request_path(&req);
        let headers = req.headers().clone();
        let body = Bytes::from_request(req, state).await?;

        let now = now_millis();
        let parsed = state.authenticator().receive(&headers).parse_headers(now)?;

        let request: RegisterRequest = serde_json::from_slice(&body)
            .map_err(|e| AuthRejection::BadRequest(e.to_string()))?;

        parsed
            .self_signed(&request.username, request.key_bundle.clone())?
            .check_signature(&method, &path, &body)?
            .finish(now)?;

        Ok(SelfSigned { request })
    }
}
