use std::sync::Arc;

use reqwest::{header::HeaderMap, header::HeaderValue, Client};
use url::Url;

use common::crypto::{KeyBundlePrivate, KeyBundlePublic};
use common::protocol::{
    now_millis, AuthHeaders, BundleRequest, DownloadRequest, DownloadResponse, ListRequest,
    ListResponse, RegisterRequest, RegisterResponse, RevokeRequest, ShareRequest, UploadRequest,
};
use common::sealer::FileKeyMaterial;

use super::error::ApiError;
use super::ApiRequest;

#[derive(Clone)]
struct Identity {
    username: String,
    bundle: Arc<KeyBundlePrivate>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    pub remote: Url,
    client: Client,
    identity: Option<Identity>,
}

impl ApiClient {
    pub fn new(remote: &Url) -> Result<Self, ApiError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder().default_headers(default_headers).build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
            identity: None,
        })
    }

    /// Sign every subsequent call as `username`.
    pub fn with_identity(mut self, username: &str, bundle: Arc<KeyBundlePrivate>) -> Self {
        self.identity = Some(Identity {
            username: username.to_string(),
            bundle,
        });
        self
    }

    pub fn username(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.username.as_str())
    }

    fn identity(&self) -> Result<&Identity, ApiError> {
        self.identity.as_ref().ok_or(ApiError::NoIdentity)
    }

    pub async fn call<T: ApiRequest>(&self, request: T) -> Result<T::Response, ApiError> {
        let identity = self.identity()?;
        let body = serde_json::to_vec(&request)?;
        let url = self.remote.join(T::PATH)?;

        let auth = AuthHeaders::sign(
            &identity.username,
            now_millis(),
            "POST",
            url.path(),
            &body,
            &identity.bundle,
        );

        let mut request_builder = self.client.post(url).body(body);
        for (name, value) in auth.to_pairs() {
            request_builder = request_builder.header(name, value);
        }
        let response = request_builder.send().await?;

        if response.status().is_success() {
            Ok(response.json::<T::Response>().await?)
        } else {
            Err(ApiError::HttpStatus(
                response.status(),
                response.text().await?,
            ))
        }
    }

    /// Publish this client's identity.
    pub async fn register(&self) -> Result<RegisterResponse, ApiError> {
        let identity = self.identity()?;
        let request = RegisterRequest {
            username: identity.username.clone(),
            key_bundle: identity.bundle.public().clone(),
        };
        self.call(request).await
    }

    pub async fn fetch_bundle(&self, username: &str) -> Result<KeyBundlePublic, ApiError> {
        let response = self
            .call(BundleRequest {
                username: username.to_string(),
            })
            .await?;
        Ok(response.key_bundle)
    }

    /// Upload a sealed file, returning its `file_id`.
    pub async fn upload(&self, request: UploadRequest) -> Result<i64, ApiError> {
        Ok(self.call(request).await?.file_id)
    }

    pub async fn list(&self) -> Result<ListResponse, ApiError> {
        self.call(ListRequest::default()).await
    }

    pub async fn download(&self, file_id: i64) -> Result<DownloadResponse, ApiError> {
        self.call(DownloadRequest { file_id }).await
    }

    /// Grant `recipient` access to an owned file, wrapping its shares to the
    /// recipient's published bundle.
    pub async fn share(
        &self,
        file_id: i64,
        material: &FileKeyMaterial,
        recipient: &str,
    ) -> Result<i64, ApiError> {
        let recipient_bundle = self.fetch_bundle(recipient).await?;
        let payload = material.share_with(&recipient_bundle)?;

        let response = self
            .call(ShareRequest {
                file_id,
                shared_with_username: recipient.to_string(),
                payload,
            })
            .await?;
        Ok(response.access_id)
    }

    pub async fn revoke(&self, file_id: i64, recipient: &str) -> Result<bool, ApiError> {
        let response = self
            .call(RevokeRequest {
                file_id,
                shared_with_username: recipient.to_string(),
            })
            .await?;
        Ok(response.revoked)
    }

    /// Get the base URL for API requests
    pub fn base_url(&self) -> &Url {
        &self.remote
    }
}
