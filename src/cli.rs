//! Command line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Snap bridge CLI.
#[derive(Parser)]
#[command(name = "snap-bridge")]
#[command(about = "Preview bridge between an embedded page and its content-management host")]
#[command(version)]
pub struct Cli {
    /// Configuration file path (default: <config dir>/snap-bridge/config.toml)
    #[arg(short, long, global = true, env = "SNAP_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// CaaS change stream commands
    Caas {
        #[command(subcommand)]
        action: CaasAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file
    Check,

    /// Print the effective configuration
    Show,
}

#[derive(Subcommand)]
pub enum CaasAction {
    /// Print change events of the preview collection as they arrive
    Watch,

    /// Wait until a document is updated in CaaS
    Wait {
        /// Preview id, e.g. `42` or `42.en_GB`
        preview_id: String,

        /// Preview language used for the locale lookup
        #[arg(short, long, default_value = "EN")]
        language: String,

        /// Resolve immediately if the document already exists
        #[arg(long)]
        insert: bool,
    },

    /// Check whether a document exists in the preview collection
    Probe {
        /// CaaS document id, e.g. `42.en_GB`
        document_id: String,
    },
}
