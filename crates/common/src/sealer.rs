//! Client-side sealing and opening of files
//!
//! [`FileSealer::seal`] turns plaintext into an [`UploadRequest`] plus the
//! [`FileKeyMaterial`] the uploader keeps locally. Opening goes the other
//! way, and always checks the owner's hybrid signature before decrypting.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{
    file_message, EncryptedPayload, EnvelopeError, FileKeyError, FileKeys, HybridSignature,
    KeyBundlePrivate, KeyBundlePublic, SecretShares, ShareError, SharePayload, SignatureError,
};
use crate::protocol::{DownloadResponse, FileMetadata, UploadRequest};

#[derive(Debug, thiserror::Error)]
pub enum SealerError {
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),
    #[error("share error: {0}")]
    Share(#[from] ShareError),
    #[error("key material error: {0}")]
    KeyMaterial(#[from] FileKeyError),
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("file was not shared with the caller")]
    NotShared,
}

/// Key material for one uploaded file, kept on the uploader's device
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FileKeyMaterialWire", into = "FileKeyMaterialWire")]
pub struct FileKeyMaterial {
    shares: SecretShares,
    file_content_nonce: Vec<u8>,
    metadata_nonce: Vec<u8>,
    file_id: Option<i64>,
}

impl fmt::Debug for FileKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKeyMaterial")
            .field("shares", &self.shares)
            .field("file_id", &self.file_id)
            .finish_non_exhaustive()
    }
}

impl FileKeyMaterial {
    pub fn shares(&self) -> &SecretShares {
        &self.shares
    }

    pub fn keys(&self) -> FileKeys {
        self.shares.derive_keys()
    }

    pub fn file_content_nonce(&self) -> &[u8] {
        &self.file_content_nonce
    }

    pub fn metadata_nonce(&self) -> &[u8] {
        &self.metadata_nonce
    }

    pub fn file_id(&self) -> Option<i64> {
        self.file_id
    }

    /// Record the id the server assigned on upload.
    pub fn set_file_id(&mut self, file_id: i64) {
        self.file_id = Some(file_id);
    }

    /// Wrap this file's shares for `recipient`.
    pub fn share_with(&self, recipient: &KeyBundlePublic) -> Result<SharePayload, ShareError> {
        SharePayload::seal(
            &self.shares,
            &self.file_content_nonce,
            &self.metadata_nonce,
            recipient,
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct FileKeyMaterialWire {
    #[serde_as(as = "Base64")]
    s_pre: Vec<u8>,
    #[serde_as(as = "Base64")]
    s_post: Vec<u8>,
    #[serde_as(as = "Base64")]
    file_content_nonce: Vec<u8>,
    #[serde_as(as = "Base64")]
    metadata_nonce: Vec<u8>,
    file_id: Option<i64>,
}

impl From<FileKeyMaterial> for FileKeyMaterialWire {
    fn from(material: FileKeyMaterial) -> Self {
        Self {
            s_pre: material.shares.pre().to_vec(),
            s_post: material.shares.post().to_vec(),
            file_content_nonce: material.file_content_nonce.clone(),
            metadata_nonce: material.metadata_nonce.clone(),
            file_id: material.file_id,
        }
    }
}

impl TryFrom<FileKeyMaterialWire> for FileKeyMaterial {
    type Error = FileKeyError;

    fn try_from(wire: FileKeyMaterialWire) -> Result<Self, Self::Error> {
        Ok(Self {
            shares: SecretShares::from_slices(&wire.s_pre, &wire.s_post)?,
            file_content_nonce: wire.file_content_nonce.clone(),
            metadata_nonce: wire.metadata_nonce.clone(),
            file_id: wire.file_id,
        })
    }
}

/// Output of [`FileSealer::seal`]
#[derive(Debug, Clone)]
pub struct SealedFile {
    pub request: UploadRequest,
    pub material: FileKeyMaterial,
}

/// A decrypted file
#[derive(Clone, PartialEq, Eq)]
pub struct OpenedFile {
    pub metadata: FileMetadata,
    pub content: Vec<u8>,
}

impl fmt::Debug for OpenedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedFile")
            .field("metadata", &self.metadata)
            .field("content", &format!("{} bytes", self.content.len()))
            .finish()
    }
}

pub struct FileSealer;

impl FileSealer {
    /// Encrypt and sign a file for upload by `username`.
    pub fn seal(
        username: &str,
        bundle: &KeyBundlePrivate,
        filename: &str,
        content: &[u8],
    ) -> Result<SealedFile, SealerError> {
        let shares = SecretShares::generate();
        let keys = shares.derive_keys();

        let metadata = serde_json::to_vec(&FileMetadata {
            filename: filename.to_string(),
            filesize: content.len() as u64,
        })?;

        let sealed_content = keys.fek.encrypt(content)?;
        let sealed_metadata = keys.mek.encrypt(&metadata)?;

        let message = file_message(
            username,
            &sealed_content.ciphertext,
            &sealed_metadata.ciphertext,
        );
        let signature = HybridSignature::sign(&message, bundle);

        let material = FileKeyMaterial {
            shares,
            file_content_nonce: sealed_content.nonce,
            metadata_nonce: sealed_metadata.nonce.clone(),
            file_id: None,
        };

        let request = UploadRequest {
            file_content: sealed_content.ciphertext,
            metadata: sealed_metadata.ciphertext,
            metadata_nonce: sealed_metadata.nonce,
            pre_quantum_signature: signature.pre_quantum,
            post_quantum_signature: signature.post_quantum,
        };

        Ok(SealedFile { request, material })
    }

    /// Open a downloaded file the caller owns, using locally held key material.
    pub fn open(
        material: &FileKeyMaterial,
        owner: &KeyBundlePublic,
        download: &DownloadResponse,
    ) -> Result<OpenedFile, SealerError> {
        verify_download(owner, download)?;
        decrypt(
            &material.keys(),
            EncryptedPayload::new(
                download.file_content.clone(),
                material.file_content_nonce.clone(),
            ),
            EncryptedPayload::new(download.metadata.clone(), material.metadata_nonce.clone()),
        )
    }

    /// Open a file another user shared with the caller.
    ///
    /// `owner` must be the bundle registered for `download.owner_username`.
    pub fn open_shared(
        recipient: &KeyBundlePrivate,
        owner: &KeyBundlePublic,
        download: &DownloadResponse,
    ) -> Result<OpenedFile, SealerError> {
        verify_download(owner, download)?;

        let share = download
            .shared_access
            .as_ref()
            .ok_or(SealerError::NotShared)?;
        let keys = share.open(recipient)?.derive_keys();

        decrypt(
            &keys,
            share.file_content_payload(download.file_content.clone()),
            share.metadata_payload(download.metadata.clone()),
        )
    }
}

fn verify_download(owner: &KeyBundlePublic, download: &DownloadResponse) -> Result<(), SealerError> {
    let message = file_message(
        &download.owner_username,
        &download.file_content,
        &download.metadata,
    );
    let signature = HybridSignature::from_parts(
        download.pre_quantum_signature.clone(),
        download.post_quantum_signature.clone(),
    );
    signature.verify(&message, owner)?;
    Ok(())
}

fn decrypt(
    keys: &FileKeys,
    content: EncryptedPayload,
    metadata: EncryptedPayload,
) -> Result<OpenedFile, SealerError> {
    let content = keys.fek.decrypt(&content)?;
    let metadata = keys.mek.decrypt(&metadata)?;

    Ok(OpenedFile {
        metadata: serde_json::from_slice(&metadata)?,
        content,
    })
}
