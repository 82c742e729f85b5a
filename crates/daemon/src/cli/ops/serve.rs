use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Args;

use strongbox_daemon::state::{AppState, StateError};
use strongbox_daemon::{spawn_service, StartError};

#[derive(Args, Debug, Clone)]
pub struct Serve {
    /// Override the listen address (default from config)
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Override the SQLite database path (default from config, in-memory if unset)
    #[arg(long)]
    pub sqlite_path: Option<PathBuf>,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),
    #[error("server failed to start: {0}")]
    Start(#[from] StartError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Serve {
    type Error = ServeError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;

        let mut config = state.config.to_service_config()?;
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(path) = &self.sqlite_path {
            config.sqlite_path = Some(path.clone());
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = Some(dir.clone());
        }

        spawn_service(&config).await?;
        Ok("server stopped".to_string())
    }
}
