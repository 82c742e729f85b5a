//! Registration, sharing and revocation through the HTTP router

mod support;

use http::StatusCode;

use common::crypto::KeyBundlePrivate;
use common::protocol::{
    BundleRequest, BundleResponse, DownloadRequest, DownloadResponse, ListRequest, ListResponse,
    RegisterRequest, RevokeRequest, RevokeResponse, ShareRequest, ShareResponse, UploadResponse,
    BUNDLE_PATH, DOWNLOAD_PATH, LIST_PATH, REGISTER_PATH, REVOKE_PATH, SHARE_PATH, UPLOAD_PATH,
};
use common::sealer::{FileKeyMaterial, FileSealer};

use crate::support::{TestApp, User};

struct Shared {
    app: TestApp,
    alice: User,
    bob: User,
    file_id: i64,
    material: FileKeyMaterial,
}

/// alice and bob registered, alice owns one file
async fn setup() -> Shared {
    let app = TestApp::new().await;
    let alice = User::new("alice");
    let bob = User::new("bob");
    app.register(&alice).await;
    app.register(&bob).await;

    let sealed = FileSealer::seal("alice", &alice.bundle, "plan.md", b"meet at noon").unwrap();
    let uploaded: UploadResponse = app.call(&alice, UPLOAD_PATH, &sealed.request).await;

    Shared {
        app,
        alice,
        bob,
        file_id: uploaded.file_id,
        material: sealed.material,
    }
}

async fn share_request(s: &Shared, recipient: &str) -> ShareRequest {
    let bundle: BundleResponse = s
        .app
        .call(
            &s.alice,
            BUNDLE_PATH,
            &BundleRequest {
                username: recipient.to_string(),
            },
        )
        .await;

    ShareRequest {
        file_id: s.file_id,
        shared_with_username: recipient.to_string(),
        payload: s.material.share_with(&bundle.key_bundle).unwrap(),
    }
}

fn download(file_id: i64) -> DownloadRequest {
    DownloadRequest { file_id }
}

#[tokio::test]
async fn test_recipient_decrypts_shared_file() {
    let s = setup().await;
    let request = share_request(&s, "bob").await;
    let (status, body) = s.app.post(&s.alice, SHARE_PATH, &request).await;
    assert_eq!(status, StatusCode::CREATED);
    let shared: ShareResponse = serde_json::from_slice(&body).unwrap();
    assert!(shared.access_id > 0);

    let downloaded: DownloadResponse = s.app.call(&s.bob, DOWNLOAD_PATH, &download(s.file_id)).await;
    assert!(!downloaded.is_owner);
    assert!(downloaded.shared_access.is_some());

    let owner: BundleResponse = s
        .app
        .call(
            &s.bob,
            BUNDLE_PATH,
            &BundleRequest {
                username: downloaded.owner_username.clone(),
            },
        )
        .await;
    let opened = FileSealer::open_shared(&s.bob.bundle, &owner.key_bundle, &downloaded).unwrap();
    assert_eq!(opened.content, b"meet at noon");
    assert_eq!(opened.metadata.filename, "plan.md");
}

#[tokio::test]
async fn test_listing_shows_both_sides() {
    let s = setup().await;
    let request = share_request(&s, "bob").await;
    let (status, _) = s.app.post(&s.alice, SHARE_PATH, &request).await;
    assert_eq!(status, StatusCode::CREATED);

    let alice_list: ListResponse = s.app.call(&s.alice, LIST_PATH, &ListRequest::default()).await;
    assert_eq!(alice_list.files.len(), 1);
    assert!(alice_list.files[0].is_owner);
    assert_eq!(alice_list.files[0].shared_with, vec!["bob".to_string()]);

    let bob_list: ListResponse = s.app.call(&s.bob, LIST_PATH, &ListRequest::default()).await;
    assert_eq!(bob_list.files.len(), 1);
    let summary = &bob_list.files[0];
    assert!(!summary.is_owner);
    assert_eq!(summary.owner_username, "alice");
    assert!(summary.shared_with.is_empty());
    assert_eq!(summary.shared_access.as_ref(), Some(&request.payload));
}

#[tokio::test]
async fn test_non_participant_cannot_download() {
    let s = setup().await;
    let carol = User::new("carol");
    s.app.register(&carol).await;

    let (status, _) = s.app.post(&carol, DOWNLOAD_PATH, &download(s.file_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = s.app.post(&carol, DOWNLOAD_PATH, &download(9_999)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_share_rules() {
    let s = setup().await;

    // self-share
    let mut to_self = share_request(&s, "bob").await;
    to_self.shared_with_username = "alice".into();
    let (status, _) = s.app.post(&s.alice, SHARE_PATH, &to_self).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // unknown recipient
    let mut to_nobody = share_request(&s, "bob").await;
    to_nobody.shared_with_username = "nobody".into();
    let (status, _) = s.app.post(&s.alice, SHARE_PATH, &to_nobody).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // not the owner
    let request = share_request(&s, "bob").await;
    let (status, _) = s.app.post(&s.bob, SHARE_PATH, &request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // duplicate
    let (status, _) = s.app.post(&s.alice, SHARE_PATH, &request).await;
    assert_eq!(status, StatusCode::CREATED);
    let again = share_request(&s, "bob").await;
    let (status, _) = s.app.post(&s.alice, SHARE_PATH, &again).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_share_payload() {
    let s = setup().await;
    let mut request = share_request(&s, "bob").await;
    request.payload.ephemeral_public_key.truncate(16);

    let (status, _) = s.app.post(&s.alice, SHARE_PATH, &request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_revoke_removes_access() {
    let s = setup().await;
    let request = share_request(&s, "bob").await;
    let (status, _) = s.app.post(&s.alice, SHARE_PATH, &request).await;
    assert_eq!(status, StatusCode::CREATED);

    let revoke = RevokeRequest {
        file_id: s.file_id,
        shared_with_username: "bob".into(),
    };

    // only the owner may revoke
    let (status, _) = s.app.post(&s.bob, REVOKE_PATH, &revoke).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let revoked: RevokeResponse = s.app.call(&s.alice, REVOKE_PATH, &revoke).await;
    assert!(revoked.revoked);

    let (status, _) = s.app.post(&s.bob, DOWNLOAD_PATH, &download(s.file_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let again: RevokeResponse = s.app.call(&s.alice, REVOKE_PATH, &revoke).await;
    assert!(!again.revoked);
}

#[tokio::test]
async fn test_registration_rules() {
    let app = TestApp::new().await;
    let alice = User::new("alice");
    app.register(&alice).await;

    // taken name, even with fresh keys
    let rival = User::new("alice");
    let request = RegisterRequest {
        username: "alice".into(),
        key_bundle: rival.bundle.public().clone(),
    };
    let (status, _) = app.post(&rival, REGISTER_PATH, &request).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // a bundle the caller cannot sign for
    let dave = User::new("dave");
    let request = RegisterRequest {
        username: "dave".into(),
        key_bundle: KeyBundlePrivate::generate().public().clone(),
    };
    let (status, _) = app.post(&dave, REGISTER_PATH, &request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // body names a different user than the headers
    let request = RegisterRequest {
        username: "eve".into(),
        key_bundle: dave.bundle.public().clone(),
    };
    let (status, _) = app.post(&dave, REGISTER_PATH, &request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bundle_lookup() {
    let app = TestApp::new().await;
    let alice = User::new("alice");
    app.register(&alice).await;

    let found: BundleResponse = app
        .call(
            &alice,
            BUNDLE_PATH,
            &BundleRequest {
                username: "alice".into(),
            },
        )
        .await;
    assert_eq!(&found.key_bundle, alice.bundle.public());

    let (status, _) = app
        .post(
            &alice,
            BUNDLE_PATH,
            &BundleRequest {
                username: "ghost".into(),
            },
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
