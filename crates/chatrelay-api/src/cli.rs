//! CLI definitions for the `chatrelay` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Chat relay between HTTP clients and a hosted agent runtime.
#[derive(Parser)]
#[command(name = "chatrelay", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the TOML service configuration.
    #[arg(long, global = true, env = "CHATRELAY_CONFIG", default_value = "chatrelay.toml")]
    pub config: PathBuf,

    /// Suppress all log output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Port to listen on (defaults to `[server] port`).
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `[server] host`).
        #[arg(long)]
        host: Option<String>,
    },
}

impl Cli {
    /// Log filter implied by `-q` / `-v`, or `None` to use the configured level.
    pub fn level_override(&self) -> Option<&'static str> {
        match self.verbose {
            0 if self.quiet => Some("error"),
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}
