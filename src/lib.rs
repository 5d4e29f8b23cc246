//! Gatekeeper - client-side authentication gatekeeper library
//!
//! This library gates access to protected operations on a backend session.
//! Guards that find the caller unauthenticated (or not an administrator)
//! park their continuation in a shared retry queue; the first one opens a
//! single login flow, and when that flow resolves every parked guard is
//! resumed or cancelled together.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `security`: Retry queue, login flow, session state, backend and coordinator
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: Handlers behind the CLI commands
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gatekeeper::{AuthCoordinator, Config};
//! use gatekeeper::security::{ChannelLoginUi, MemoryNavigator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let (ui, _prompts) = ChannelLoginUi::new();
//!     let navigator = Arc::new(MemoryNavigator::new("/"));
//!     let coordinator = AuthCoordinator::from_config(&config, Arc::new(ui), navigator)?;
//!
//!     coordinator.require_authenticated_user().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod security;

// Re-export commonly used types
pub use config::Config;
pub use error::{GatekeeperError, Result};
pub use security::{AuthCoordinator, Credentials, Identity, RetryReason, SessionState};

#[cfg(test)]
pub mod test_utils;
