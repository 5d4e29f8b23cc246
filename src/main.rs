//! Gatekeeper - client-side authentication gatekeeper
//!
#![doc = "Gatekeeper - client-side authentication gatekeeper"]
#![doc = "Main entry point for the gatekeeper CLI."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gatekeeper::cli::{Cli, Commands};
use gatekeeper::commands;
use gatekeeper::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Whoami => {
            tracing::info!("Probing current session");
            commands::whoami::run_whoami(config).await?;
            Ok(())
        }
        Commands::Login { email, password } => {
            tracing::info!("Logging in as {}", email);
            if password.is_none() {
                tracing::debug!("No password given, prompting");
            }
            commands::login::run_login(config, email, password).await?;
            Ok(())
        }
        Commands::Logout { redirect } => {
            tracing::info!("Logging out");
            if let Some(target) = &redirect {
                tracing::debug!("Redirecting to {} afterwards", target);
            }
            commands::logout::run_logout(config, redirect).await?;
            Ok(())
        }
        Commands::Guard { admin } => {
            tracing::info!(admin, "Running guard");
            commands::guard::run_guard(config, admin).await?;
            Ok(())
        }
    }
}

/// Initialize tracing/logging
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug output.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "gatekeeper=debug"
    } else {
        "gatekeeper=info"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
