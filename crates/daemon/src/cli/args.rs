pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "strongbox")]
#[command(about = "End-to-end encrypted file store server")]
pub struct Args {
    /// Path to the config file (defaults to the platform config directory)
    #[arg(long = "config", global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
