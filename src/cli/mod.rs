//! CLI module for Compass
//!
//! Provides command-line interface parsing for the compass-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod analyze;
pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Compass - budgeted company research runs
#[derive(Parser, Debug)]
#[command(
    name = "compass-server",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Compass - investor-grade company dossiers from budgeted research agents",
    long_about = "Runs discovery, parallel research, verification and synthesis agents against\n\
                  a shared search-credit and LLM budget, and serves the results over HTTP.\n\n\
                  Run without arguments to start the server, or use 'init' to scaffold a config.",
    after_help = "EXAMPLES:\n    \
                  compass-server init                       # Scaffold compass.toml and .env.example\n    \
                  compass-server                            # Start the server (requires compass.toml)\n    \
                  compass-server --config my.toml           # Use a custom config file\n    \
                  compass-server analyze Acme --domain acme.com"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "compass.toml", global = true)]
    pub config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (the default)
    Serve,

    /// Write a commented compass.toml and .env.example
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Run one analysis in-process and print the finished run
    Analyze {
        /// Company name
        company: String,

        /// Company website domain
        #[arg(short, long)]
        domain: Option<String>,

        /// Polling interval in milliseconds
        #[arg(long, default_value = "500")]
        poll_ms: u64,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
