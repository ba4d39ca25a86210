//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroquery compile --catalog <path> [--config <path>]
//! - aeroquery explain --catalog <path> [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AeroQuery - relation-aware filter to pipeline compiler
#[derive(Parser, Debug)]
#[command(name = "aeroquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile one filter into an aggregation pipeline and exit
    Compile {
        /// Path to the relation catalog
        #[arg(long)]
        catalog: PathBuf,

        /// Path to configuration file (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show how one read would execute, without touching a store
    Explain {
        /// Path to the relation catalog
        #[arg(long)]
        catalog: PathBuf,

        /// Path to configuration file (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
