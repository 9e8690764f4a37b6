//! Command-line interface for faultline.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// faultline - resolve, inject and recover faults against a live cluster.
#[derive(Parser)]
#[command(name = "faultline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Engine configuration file (YAML or TOML)
    #[arg(short, long, env = "FAULTLINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FAULTLINE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a scope expression against the cluster topology
    Resolve {
        /// Cluster properties file
        properties: PathBuf,

        /// Scope expression, e.g. '$zone.leader-storage-0'
        expression: String,
    },

    /// Compile faults and write their manifests without applying them
    Compile {
        /// Cluster properties file
        properties: PathBuf,

        /// Compile only this fault (defaults to every fault in sys.faults)
        #[arg(short, long)]
        fault: Vec<String>,
    },

    /// Run the fault campaign: compile, apply, and recover
    Inject {
        /// Cluster properties file
        properties: PathBuf,

        /// Exit after applying without recovering the faults
        #[arg(long)]
        no_wait: bool,
    },

    /// Show version information
    Version,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
