#[allow(clippy::module_inception)]
mod client;
mod error;

pub use client::ApiClient;
pub use error::ApiError;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A signed `POST` to a fixed route
///
/// The JSON body is serialized once and the exact bytes are both signed and
/// sent, so the server verifies what the client signed.
pub trait ApiRequest: Serialize {
    type Response: DeserializeOwned;

    const PATH: &'static str;
}
