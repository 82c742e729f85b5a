#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http::{Request, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower::ServiceExt;

use blob_store::BlobStorage;
use common::crypto::KeyBundlePrivate;
use common::protocol::{now_millis, AuthHeaders, RegisterRequest, REGISTER_PATH};
use strongbox_daemon::auth::RequestAuthenticator;
use strongbox_daemon::database::Database;
use strongbox_daemon::http_server::{self, Config};
use strongbox_daemon::upload::UploadLimits;
use strongbox_daemon::ServiceState;

/// A client identity for tests
pub struct User {
    pub username: String,
    pub bundle: KeyBundlePrivate,
    last_timestamp: AtomicI64,
}

impl User {
    pub fn new(username: &str) -> Self {
        Self::with_bundle(username, KeyBundlePrivate::generate())
    }

    pub fn with_bundle(username: &str, bundle: KeyBundlePrivate) -> Self {
        Self {
            username: username.to_string(),
            bundle,
            last_timestamp: AtomicI64::new(0),
        }
    }

    /// Signing is deterministic, so two identical requests in the same
    /// millisecond would look like a replay. Never hand out a timestamp twice.
    fn next_timestamp(&self) -> i64 {
        let now = now_millis();
        let previous = self
            .last_timestamp
            .fetch_max(now, Ordering::SeqCst);
        if previous >= now {
            self.last_timestamp.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            now
        }
    }

    /// A `POST` to `path` signed at `timestamp_ms`.
    pub fn signed_at(&self, path: &str, body: Vec<u8>, timestamp_ms: i64) -> Request<Body> {
        let auth = AuthHeaders::sign(
            &self.username,
            timestamp_ms,
            "POST",
            path,
            &body,
            &self.bundle,
        );
        let mut builder = Request::post(path).header("content-type", "application/json");
        for (name, value) in auth.to_pairs() {
            builder = builder.header(name, value);
        }
        builder.body(Body::from(body)).unwrap()
    }

    pub fn signed(&self, path: &str, body: Vec<u8>) -> Request<Body> {
        self.signed_at(path, body, self.next_timestamp())
    }
}

/// The full router over in-memory storage
pub struct TestApp {
    pub router: Router,
    pub state: ServiceState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_limits(UploadLimits::default()).await
    }

    pub async fn with_limits(limits: UploadLimits) -> Self {
        let database = Database::connect(None).await.unwrap();
        let state = ServiceState::new(
            database,
            BlobStorage::memory(),
            Arc::new(RequestAuthenticator::default()),
            limits,
        );
        let config = Config::new("127.0.0.1:0".parse().unwrap(), tracing::Level::DEBUG);

        Self {
            router: http_server::router(&config, state.clone()),
            state,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    pub async fn post<T: Serialize>(
        &self,
        user: &User,
        path: &str,
        body: &T,
    ) -> (StatusCode, Vec<u8>) {
        let body = serde_json::to_vec(body).unwrap();
        self.send(user.signed(path, body)).await
    }

    /// Post and decode a successful response.
    pub async fn call<T: Serialize, R: DeserializeOwned>(
        &self,
        user: &User,
        path: &str,
        body: &T,
    ) -> R {
        let (status, body) = self.post(user, path, body).await;
        assert!(
            status.is_success(),
            "{} failed with {}: {}",
            path,
            status,
            String::from_utf8_lossy(&body)
        );
        serde_json::from_slice(&body).unwrap()
    }

    pub async fn register(&self, user: &User) {
        let request = RegisterRequest {
            username: user.username.clone(),
            key_bundle: user.bundle.public().clone(),
        };
        let (status, _) = self.post(user, REGISTER_PATH, &request).await;
        assert_eq!(status, StatusCode::CREATED);
    }
}
