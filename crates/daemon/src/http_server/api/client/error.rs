use reqwest::StatusCode;

use common::crypto::ShareError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
    #[error("failed to encode request: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to wrap file keys: {0}")]
    Share(#[from] ShareError),
    #[error("client has no identity to sign requests with")]
    NoIdentity,
}
