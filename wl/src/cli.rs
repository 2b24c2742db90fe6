//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// WavesLab - household simulation environment
#[derive(Parser, Debug)]
#[command(
    name = "wl",
    version,
    about = "Control simulated household nodes and run the reporting loop"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Directory holding nodes.json and users.json (overrides config)
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a node by id
    ///
    /// Examples:
    ///   wl start living-room-light
    ///   wl start kitchen-faucet --user alice
    Start {
        /// Id of the node to start
        id: String,

        /// Associate a user with this node
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Stop a node by id
    Stop {
        /// Id of the node to stop
        id: String,
    },

    /// List nodes and their status
    Status,

    /// List users
    Users,

    /// Set the destination URL a node reports to
    Endpoint {
        /// Id of the node
        id: String,

        /// Destination URL
        url: String,
    },

    /// Run the reporting loop and the management API
    Serve {
        /// Address for the management API (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Run an ingress endpoint that logs delivered reports
    Listen {
        /// Address to listen on (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },
}
