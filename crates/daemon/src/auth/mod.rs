//! Request authentication
//!
//! Every API call is checked in a fixed order, each stage a distinct type
//! that can only be produced by the one before it:
//!
//! ```text
//! Received ─parse_headers─► HeadersParsed ─resolve_user─► UserResolved
//!          ─check_signature─► SignatureChecked ─finish─► Verified
//! ```
//!
//! Any stage may fail with an [`AuthError`]. The reason is only ever logged;
//! callers see a generic `401`.
//!
//! An unknown username is not rejected at lookup. The request carries on
//! against a decoy bundle and is turned away after the full hybrid verify,
//! so a missing user costs the same as a bad signature.

mod extractor;
mod replay;

pub use extractor::{AuthRejection, Authenticated, SelfSigned};
pub use replay::ReplayCache;

use http::{HeaderMap, Method};

use common::crypto::{HybridSignature, KeyBundleError, KeyBundlePrivate, KeyBundlePublic};
use common::protocol::{
    request_message, COMBINED_SIGNATURE_HEADER, POST_QUANTUM_SIGNATURE_HEADER,
    PRE_QUANTUM_SIGNATURE_HEADER, TIMESTAMP_HEADER, USERNAME_HEADER,
};

use crate::database::models::User;
use crate::database::Database;

/// Maximum accepted clock skew between client and server
pub const DEFAULT_AUTH_WINDOW_MS: i64 = 300_000;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing header {0}")]
    MissingHeader(&'static str),
    #[error("malformed header {0}")]
    MalformedHeader(&'static str),
    #[error("timestamp outside freshness window (skew {skew_ms} ms)")]
    Stale { skew_ms: i64 },
    #[error("unknown user")]
    UnknownUser,
    #[error("username does not match the signed request")]
    UsernameMismatch,
    #[error("stored key bundle unreadable: {0}")]
    StoredBundle(#[from] KeyBundleError),
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("signature already used")]
    Replayed,
    #[error("user lookup failed: {0}")]
    Lookup(#[from] sqlx::Error),
}

/// Verifies signed requests against stored key bundles
#[derive(Debug)]
pub struct RequestAuthenticator {
    window_ms: i64,
    replays: Option<ReplayCache>,
    /// Transport JSON of a bundle nobody holds the keys for. Parsed and
    /// verified against in place of a user that does not exist.
    decoy_bundle: String,
}

impl Default for RequestAuthenticator {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_WINDOW_MS, true)
    }
}

impl RequestAuthenticator {
    pub fn new(window_ms: i64, reject_replays: bool) -> Self {
        Self {
            window_ms,
            replays: reject_replays.then(ReplayCache::new),
            decoy_bundle: KeyBundlePrivate::generate().public().to_json(),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// Start authenticating a request with the given headers.
    pub fn receive<'a>(&'a self, headers: &'a HeaderMap) -> Received<'a> {
        Received {
            authenticator: self,
            headers,
        }
    }
}

/// A request nothing has been checked on yet
pub struct Received<'a> {
    authenticator: &'a RequestAuthenticator,
    headers: &'a HeaderMap,
}

/// Headers present, well formed, and fresh
#[derive(Debug)]
pub struct HeadersParsed<'a> {
    authenticator: &'a RequestAuthenticator,
    username: String,
    timestamp_ms: i64,
    signature: HybridSignature,
}

/// A bundle to verify against has been chosen. `S` identifies the signer: a
/// stored `user_id` for ordinary calls, `()` for self-signed registration.
/// `subject` is `None` when the username is unknown and `bundle` is the decoy.
#[derive(Debug)]
pub struct UserResolved<'a, S> {
    parsed: HeadersParsed<'a>,
    subject: Option<S>,
    bundle: KeyBundlePublic,
}

/// Both signature halves verified over the request
#[derive(Debug)]
pub struct SignatureChecked<'a, S> {
    parsed: HeadersParsed<'a>,
    subject: S,
    bundle: KeyBundlePublic,
}

/// Outcome of a fully authenticated request
#[derive(Debug, Clone)]
pub struct Verified<S> {
    pub subject: S,
    pub username: String,
    pub bundle: KeyBundlePublic,
}

fn header<'h>(headers: &'h HeaderMap, name: &'static str) -> Result<Option<&'h str>, AuthError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()))
            .map_err(|_| AuthError::MalformedHeader(name)),
    }
}

fn required<'h>(headers: &'h HeaderMap, name: &'static str) -> Result<&'h str, AuthError> {
    header(headers, name)?.ok_or(AuthError::MissingHeader(name))
}

impl<'a> Received<'a> {
    /// Read the username, timestamp and signature headers and check freshness.
    pub fn parse_headers(self, now_ms: i64) -> Result<HeadersParsed<'a>, AuthError> {
        let username = required(self.headers, USERNAME_HEADER)?;
        if username.is_empty() {
            return Err(AuthError::MalformedHeader(USERNAME_HEADER));
        }

        let timestamp_ms: i64 = required(self.headers, TIMESTAMP_HEADER)?
            .parse()
            .map_err(|_| AuthError::MalformedHeader(TIMESTAMP_HEADER))?;

        let pre = header(self.headers, PRE_QUANTUM_SIGNATURE_HEADER)?;
        let post = header(self.headers, POST_QUANTUM_SIGNATURE_HEADER)?;
        let signature = match (pre, post) {
            (Some(pre), Some(post)) => HybridSignature::from_base64_parts(pre, post)
                .map_err(|_| AuthError::MalformedHeader(PRE_QUANTUM_SIGNATURE_HEADER))?,
            _ => HybridSignature::from_header(required(self.headers, COMBINED_SIGNATURE_HEADER)?)
                .map_err(|_| AuthError::MalformedHeader(COMBINED_SIGNATURE_HEADER))?,
        };

        let skew_ms = now_ms.saturating_sub(timestamp_ms).saturating_abs();
        if skew_ms > self.authenticator.window_ms {
            return Err(AuthError::Stale { skew_ms });
        }

        Ok(HeadersParsed {
            authenticator: self.authenticator,
            username: username.to_string(),
            timestamp_ms,
            signature,
        })
    }
}

impl<'a> HeadersParsed<'a> {
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Load the signer's stored bundle, or the decoy if there is no such user.
    pub async fn resolve_user(self, db: &Database) -> Result<UserResolved<'a, i64>, AuthError> {
        let (subject, bundle) = match User::by_username(&self.username, db).await? {
            Some(user) => (Some(user.user_id), user.key_bundle()?),
            None => (
                None,
                KeyBundlePublic::from_json(&self.authenticator.decoy_bundle)?,
            ),
        };

        Ok(UserResolved {
            parsed: self,
            subject,
            bundle,
        })
    }

    /// Trust a bundle the request carries itself, for registration.
    pub fn self_signed(
        self,
        username: &str,
        bundle: KeyBundlePublic,
    ) -> Result<UserResolved<'a, ()>, AuthError> {
        if username != self.username {
            return Err(AuthError::UsernameMismatch);
        }
        Ok(UserResolved {
            parsed: self,
            subject: Some(()),
            bundle,
        })
    }
}

impl<'a, S> UserResolved<'a, S> {
    /// Whether the username matched a stored user.
    pub fn is_known(&self) -> bool {
        self.subject.is_some()
    }

    /// Verify the hybrid signature over `username|timestamp|METHOD|path|body`.
    ///
    /// An unknown user is rejected here, after verification has run.
    pub fn check_signature(
        self,
        method: &Method,
        path: &str,
        body: &[u8],
    ) -> Result<SignatureChecked<'a, S>, AuthError> {
        let message = request_message(
            &self.parsed.username,
            self.parsed.timestamp_ms,
            method.as_str(),
            path,
            body,
        );
        let verified = self.parsed.signature.verify(&message, &self.bundle);

        let Some(subject) = self.subject else {
            return Err(AuthError::UnknownUser);
        };
        verified.map_err(|_| AuthError::SignatureInvalid)?;

        Ok(SignatureChecked {
            parsed: self.parsed,
            subject,
            bundle: self.bundle,
        })
    }
}

impl<'a, S> SignatureChecked<'a, S> {
    /// Apply the replay guard and hand back the verified identity.
    pub fn finish(self, now_ms: i64) -> Result<Verified<S>, AuthError> {
        let SignatureChecked {
            parsed,
            subject,
            bundle,
        } = self;

        if let Some(replays) = &parsed.authenticator.replays {
            let expires_at = parsed
                .timestamp_ms
                .saturating_add(parsed.authenticator.window_ms);
            if !replays.check_and_record(&parsed.signature, expires_at, now_ms) {
                return Err(AuthError::Replayed);
            }
        }

        Ok(Verified {
            subject,
            username: parsed.username,
            bundle,
        })
    }
}

#[cfg(test)]
mod tests {
    use common::crypto::KeyBundlePrivate;
    use common::protocol::{AuthHeaders, LIST_PATH};
    use http::HeaderValue;

    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn headers_for(auth: &AuthHeaders) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in auth.to_pairs() {
            headers.insert(name, HeaderValue::from_str(&value).unwrap());
        }
        headers
    }

    fn signed(bundle: &KeyBundlePrivate, timestamp_ms: i64, body: &[u8]) -> HeaderMap {
        headers_for(&AuthHeaders::sign(
            "alice",
            timestamp_ms,
            "POST",
            LIST_PATH,
            body,
            bundle,
        ))
    }

    async fn setup() -> (Database, KeyBundlePrivate) {
        let db = Database::connect(None).await.unwrap();
        let bundle = KeyBundlePrivate::generate();
        User::create("alice", bundle.public(), &db).await.unwrap();
        (db, bundle)
    }

    async fn authenticate(
        authenticator: &RequestAuthenticator,
        db: &Database,
        headers: &HeaderMap,
        body: &[u8],
        now_ms: i64,
    ) -> Result<Verified<i64>, AuthError> {
        authenticator
            .receive(headers)
            .parse_headers(now_ms)?
            .resolve_user(db)
            .await?
            .check_signature(&Method::POST, LIST_PATH, body)?
            .finish(now_ms)
    }

    #[tokio::test]
    async fn test_valid_request() {
        let (db, bundle) = setup().await;
        let authenticator = RequestAuthenticator::default();
        let headers = signed(&bundle, NOW, b"{}");

        let verified = authenticate(&authenticator, &db, &headers, b"{}", NOW)
            .await
            .unwrap();
        assert_eq!(verified.username, "alice");
        assert_eq!(&verified.bundle, bundle.public());
    }

    #[tokio::test]
    async fn test_freshness_boundary() {
        let (db, bundle) = setup().await;
        let authenticator = RequestAuthenticator::new(DEFAULT_AUTH_WINDOW_MS, false);

        let headers = signed(&bundle, NOW - 299_999, b"{}");
        assert!(authenticate(&authenticator, &db, &headers, b"{}", NOW)
            .await
            .is_ok());

        let headers = signed(&bundle, NOW - 300_000, b"{}");
        assert!(authenticate(&authenticator, &db, &headers, b"{}", NOW)
            .await
            .is_ok());

        let headers = signed(&bundle, NOW - 300_001, b"{}");
        let err = authenticate(&authenticator, &db, &headers, b"{}", NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Stale { skew_ms: 300_001 }));

        let headers = signed(&bundle, NOW + 300_001, b"{}");
        assert!(authenticate(&authenticator, &db, &headers, b"{}", NOW)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (db, _) = setup().await;
        let stranger = KeyBundlePrivate::generate();
        let authenticator = RequestAuthenticator::default();
        let headers = headers_for(&AuthHeaders::sign(
            "mallory", NOW, "POST", LIST_PATH, b"{}", &stranger,
        ));

        let err = authenticate(&authenticator, &db, &headers, b"{}", NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser));
    }

    #[tokio::test]
    async fn test_unknown_user_is_verified_against_decoy() {
        let (db, _) = setup().await;
        let stranger = KeyBundlePrivate::generate();
        let authenticator = RequestAuthenticator::default();
        let headers = headers_for(&AuthHeaders::sign(
            "mallory", NOW, "POST", LIST_PATH, b"{}", &stranger,
        ));

        // lookup does not short-circuit, the signature stage still runs
        let resolved = authenticator
            .receive(&headers)
            .parse_headers(NOW)
            .unwrap()
            .resolve_user(&db)
            .await
            .unwrap();
        assert!(!resolved.is_known());
        assert_ne!(&resolved.bundle, stranger.public());
        assert_eq!(
            resolved.bundle.to_json(),
            authenticator.decoy_bundle,
            "unknown users verify against the decoy bundle"
        );

        let err = resolved
            .check_signature(&Method::POST, LIST_PATH, b"{}")
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser));
    }

    #[tokio::test]
    async fn test_tampered_body_rejected() {
        let (db, bundle) = setup().await;
        let authenticator = RequestAuthenticator::default();
        let headers = signed(&bundle, NOW, b"{}");

        let err = authenticate(&authenticator, &db, &headers, b"{\"a\":1}", NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SignatureInvalid));
    }

    #[tokio::test]
    async fn test_stale_post_quantum_signature_rejected() {
        let (db, bundle) = setup().await;
        let authenticator = RequestAuthenticator::default();

        let old = AuthHeaders::sign("alice", NOW - 1_000, "POST", LIST_PATH, b"{}", &bundle);
        let mut fresh = AuthHeaders::sign("alice", NOW, "POST", LIST_PATH, b"{}", &bundle);
        fresh.signature.post_quantum = old.signature.post_quantum;

        let err = authenticate(&authenticator, &db, &headers_for(&fresh), b"{}", NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SignatureInvalid));
    }

    #[tokio::test]
    async fn test_replay_rejected() {
        let (db, bundle) = setup().await;
        let authenticator = RequestAuthenticator::default();
        let headers = signed(&bundle, NOW, b"{}");

        authenticate(&authenticator, &db, &headers, b"{}", NOW)
            .await
            .unwrap();
        let err = authenticate(&authenticator, &db, &headers, b"{}", NOW + 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Replayed));
    }

    #[tokio::test]
    async fn test_replay_allowed_when_disabled() {
        let (db, bundle) = setup().await;
        let authenticator = RequestAuthenticator::new(DEFAULT_AUTH_WINDOW_MS, false);
        let headers = signed(&bundle, NOW, b"{}");

        for _ in 0..2 {
            authenticate(&authenticator, &db, &headers, b"{}", NOW)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_combined_signature_header() {
        let (db, bundle) = setup().await;
        let authenticator = RequestAuthenticator::default();
        let auth = AuthHeaders::sign("alice", NOW, "POST", LIST_PATH, b"{}", &bundle);

        let mut headers = HeaderMap::new();
        headers.insert(USERNAME_HEADER, HeaderValue::from_static("alice"));
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_str(&NOW.to_string()).unwrap());
        headers.insert(
            COMBINED_SIGNATURE_HEADER,
            HeaderValue::from_str(&auth.signature.to_header()).unwrap(),
        );

        assert!(authenticate(&authenticator, &db, &headers, b"{}", NOW)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_missing_headers() {
        let (db, _) = setup().await;
        let authenticator = RequestAuthenticator::default();

        let err = authenticate(&authenticator, &db, &HeaderMap::new(), b"", NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingHeader(USERNAME_HEADER)));

        let mut headers = HeaderMap::new();
        headers.insert(USERNAME_HEADER, HeaderValue::from_static("alice"));
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_static("yesterday"));
        let err = authenticate(&authenticator, &db, &headers, b"", NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedHeader(TIMESTAMP_HEADER)));
    }

    #[test]
    fn test_self_signed_username_must_match() {
        let bundle = KeyBundlePrivate::generate();
        let authenticator = RequestAuthenticator::default();
        let headers = signed(&bundle, NOW, b"{}");

        let parsed = authenticator.receive(&headers).parse_headers(NOW).unwrap();
        let err = parsed
            .self_signed("bob", bundle.public().clone())
            .unwrap_err();
        assert!(matches!(err, AuthError::UsernameMismatch));
    }
}
