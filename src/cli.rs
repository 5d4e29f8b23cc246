//! Command-line interface definition for Gatekeeper
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to look up the session, log in and out, and run a
//! guard against the configured backend.

use clap::{Parser, Subcommand};

/// Gatekeeper - client-side authentication gatekeeper
///
/// Checks a backend session before letting guarded operations through,
/// prompting for credentials once when they are blocked.
#[derive(Parser, Debug, Clone)]
#[command(name = "gatekeeper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the backend base URL from config
    #[arg(long)]
    pub base_url: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Gatekeeper
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the user the backend reports for the current session
    Whoami,

    /// Log in with an e-mail address and password
    Login {
        /// Login e-mail address
        #[arg(short, long)]
        email: String,

        /// Password; prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Log out of the current session
    Logout {
        /// Location to go to afterwards (defaults to navigation.default_path)
        #[arg(short, long)]
        redirect: Option<String>,
    },

    /// Run a guard, prompting for credentials if it is blocked
    Guard {
        /// Require an administrator instead of any logged-in user
        #[arg(long)]
        admin: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            base_url: None,
            command: Commands::Whoami,
        }
    }
}
