use std::path::PathBuf;

use clap::Args;

use common::crypto::KeyBundlePrivate;
use strongbox_daemon::key_file::{KeyFile, KeyFileError};

/// Generate a key bundle and write it to a key file
#[derive(Args, Debug, Clone)]
pub struct Keygen {
    /// Username the bundle will be registered under
    #[arg(long)]
    pub username: String,

    /// Where to write the key file
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum KeygenError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error(transparent)]
    KeyFile(#[from] KeyFileError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Keygen {
    type Error = KeygenError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        if self.username.is_empty() {
            return Err(KeygenError::EmptyUsername);
        }

        let bundle = KeyBundlePrivate::generate();
        KeyFile::new(&self.username, &bundle).save(&self.out)?;

        Ok(format!(
            "wrote key bundle for '{}' to {}",
            self.username,
            self.out.display()
        ))
    }
}
