//! Bringing a server up and taking it down

mod logging;
mod shutdown;

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;

pub use logging::{init_logging, LogGuards};
pub use shutdown::ShutdownHandle;

use crate::http_server;
use crate::service_state::StateSetupError;
use crate::{ServiceConfig, ServiceState};

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("failed to set up service state: {0}")]
    State(#[from] StateSetupError),
    #[error("failed to listen on {addr}: {source}")]
    Listen { addr: SocketAddr, source: io::Error },
    #[error("failed to install signal handlers: {0}")]
    Signals(io::Error),
}

/// Open the database and blob store, bind, and start serving in the
/// background.
///
/// Returns the state the server runs on and the address actually bound,
/// which differs from the configured one when the port is 0.
pub async fn start_service(
    config: &ServiceConfig,
) -> Result<(ServiceState, SocketAddr, ShutdownHandle), StartError> {
    let state = ServiceState::from_config(config).await?;

    let listen_error = |source| StartError::Listen {
        addr: config.listen_addr,
        source,
    };
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(listen_error)?;
    let addr = listener.local_addr().map_err(listen_error)?;

    let (trigger, stop) = watch::channel(false);
    let signals = shutdown::listen_for_signals(trigger.clone()).map_err(StartError::Signals)?;

    let server = tokio::spawn(http_server::serve(
        listener,
        http_server::Config::new(addr, config.log_level),
        state.clone(),
        stop,
    ));
    tracing::info!(%addr, "strongbox listening");

    Ok((state, addr, ShutdownHandle::new(trigger, server, signals)))
}

/// Run the server in the foreground until a signal stops it.
pub async fn spawn_service(config: &ServiceConfig) -> Result<(), StartError> {
    let _guards = init_logging(config.log_level, config.log_dir.as_deref());

    let (_, _, handle) = start_service(config).await.inspect_err(|e| {
        tracing::error!("failed to start: {}", e);
    })?;
    handle.wait().await;
    Ok(())
}
