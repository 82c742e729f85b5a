use serde::{Deserialize, Serialize};

use crate::crypto::KeyBundlePublic;

/// Publish a username and its public key bundle.
///
/// The request is signed with the private half of `key_bundle` itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub key_bundle: KeyBundlePublic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub username: String,
}

/// Look up another user's public key bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRequest {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleResponse {
    pub username: String,
    pub key_bundle: KeyBundlePublic,
}
