//! Plaintext key file handed to a password-protection collaborator
//!
//! ```toml
//! username = "alice"
//! public_bundle = '{"preQuantum":{...},"postQuantum":{...}}'
//! secret = "<hex>"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use common::crypto::{KeyBundleError, KeyBundlePrivate};

#[derive(Serialize, Deserialize)]
pub struct KeyFile {
    pub username: String,
    /// Transport JSON of the public bundle
    pub public_bundle: String,
    /// Hex of the private bundle's secret bytes
    secret: String,
}

impl std::fmt::Debug for KeyFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFile")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl KeyFile {
    pub fn new(username: &str, bundle: &KeyBundlePrivate) -> Self {
        Self {
            username: username.to_string(),
            public_bundle: bundle.public().to_json(),
            secret: hex::encode(&bundle.to_secret_bytes()[..]),
        }
    }

    /// Write the file, refusing to overwrite an existing one.
    pub fn save(&self, path: &Path) -> Result<(), KeyFileError> {
        if path.exists() {
            return Err(KeyFileError::AlreadyExists(path.display().to_string()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, KeyFileError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Rebuild the private bundle, checking it against the stored public half.
    pub fn bundle(&self) -> Result<KeyBundlePrivate, KeyFileError> {
        let secret = Zeroizing::new(
            hex::decode(&self.secret).map_err(|e| KeyFileError::InvalidSecret(e.to_string()))?,
        );
        let bundle = KeyBundlePrivate::from_secret_bytes(&secret)?;
        if bundle.public().to_json() != self.public_bundle {
            return Err(KeyFileError::PublicMismatch);
        }
        Ok(bundle)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeyFileError {
    #[error("key file already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid secret encoding: {0}")]
    InvalidSecret(String),
    #[error("public bundle does not match secret")]
    PublicMismatch,
    #[error("key bundle error: {0}")]
    KeyBundle(#[from] KeyBundleError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys/alice.toml");
        let bundle = KeyBundlePrivate::generate();

        KeyFile::new("alice", &bundle).save(&path).unwrap();
        let loaded = KeyFile::load(&path).unwrap();

        assert_eq!(loaded.username, "alice");
        assert_eq!(loaded.bundle().unwrap().public(), bundle.public());
    }

    #[test]
    fn test_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.toml");
        let bundle = KeyBundlePrivate::generate();

        KeyFile::new("alice", &bundle).save(&path).unwrap();
        assert!(matches!(
            KeyFile::new("alice", &bundle).save(&path),
            Err(KeyFileError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_mismatched_public_half() {
        let mut file = KeyFile::new("alice", &KeyBundlePrivate::generate());
        file.public_bundle = KeyBundlePrivate::generate().public().to_json();
        assert!(matches!(file.bundle(), Err(KeyFileError::PublicMismatch)));
    }
}
