//! Strongbox server
//!
//! Stores ciphertext it cannot read: clients upload files encrypted under
//! keys the server never sees, sign every request with a hybrid
//! Ed25519 + ML-DSA-87 signature, and share files by wrapping key shares to
//! the recipient's X25519 key.

pub mod auth;
pub mod database;
pub mod http_server;
pub mod key_file;
pub mod process;
pub mod service_config;
pub mod service_state;
pub mod upload;

// App state (configuration file, paths)
pub mod state;

pub use process::{spawn_service, start_service, ShutdownHandle, StartError};
pub use service_config::Config as ServiceConfig;
pub use service_state::State as ServiceState;
pub use state::{AppConfig, AppState, StateError};
