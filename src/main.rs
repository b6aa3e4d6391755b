//! Snap bridge
//!
//! Command line entry point: configuration checks and CaaS change stream
//! tooling for the preview bridge.

mod cli;
mod cmd_caas;
mod cmd_config;
mod logging;

use clap::Parser;
use tracing::debug;

use snap_config::ConfigLoader;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { action } => cmd_config::handle(action, cli.config.as_deref()),
        Commands::Caas { action } => {
            let config = ConfigLoader::load_or_default(cli.config.as_deref())?;
            let _guard = logging::init(&config.logging)?;
            debug!("Starting snap-bridge v{}", env!("CARGO_PKG_VERSION"));
            cmd_caas::handle(action, &config).await
        }
    }
}
