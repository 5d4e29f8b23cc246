//! Configuration management for Gatekeeper
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{GatekeeperError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Gatekeeper
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend endpoints consulted by the coordinator
    #[serde(default)]
    pub backend: BackendConfig,

    /// Navigation defaults
    #[serde(default)]
    pub navigation: NavigationConfig,
}

/// Backend endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the application server; endpoint paths are appended to it
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the login endpoint
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Path of the logout endpoint
    #[serde(default = "default_logout_path")]
    pub logout_path: String,

    /// Path of the current-user endpoint
    #[serde(default = "default_current_user_path")]
    pub current_user_path: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_logout_path() -> String {
    "/logout".to_string()
}

fn default_current_user_path() -> String {
    "/current-user".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_path: default_login_path(),
            logout_path: default_logout_path(),
            current_user_path: default_current_user_path(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Navigation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Location used after a cancelled login or a logout without a target
    #[serde(default = "default_path")]
    pub default_path: String,
}

fn default_path() -> String {
    crate::security::coordinator::DEFAULT_REDIRECT_PATH.to_string()
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            default_path: default_path(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GatekeeperError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| GatekeeperError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("GATEKEEPER_BASE_URL") {
            self.backend.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("GATEKEEPER_TIMEOUT_SECONDS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.backend.timeout_seconds = secs,
                Err(_) => tracing::warn!(
                    "Ignoring GATEKEEPER_TIMEOUT_SECONDS={}: not a number",
                    timeout
                ),
            }
        }

        if let Ok(default_path) = std::env::var("GATEKEEPER_DEFAULT_PATH") {
            self.navigation.default_path = default_path;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(base_url) = &cli.base_url {
            tracing::debug!("Using backend override from CLI: {}", base_url);
            self.backend.base_url = base_url.clone();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.is_empty() {
            return Err(GatekeeperError::Config("backend.base_url cannot be empty".to_string()).into());
        }

        url::Url::parse(&self.backend.base_url).map_err(|e| {
            GatekeeperError::Config(format!(
                "backend.base_url is not a valid URL ({}): {}",
                self.backend.base_url, e
            ))
        })?;

        for (name, path) in [
            ("backend.login_path", &self.backend.login_path),
            ("backend.logout_path", &self.backend.logout_path),
            ("backend.current_user_path", &self.backend.current_user_path),
            ("navigation.default_path", &self.navigation.default_path),
        ] {
            if !path.starts_with('/') {
                return Err(
                    GatekeeperError::Config(format!("{} must start with '/': {}", name, path))
                        .into(),
                );
            }
        }

        if self.backend.timeout_seconds == 0 {
            return Err(GatekeeperError::Config(
                "backend.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.backend.timeout_seconds > 600 {
            return Err(GatekeeperError::Config(
                "backend.timeout_seconds must be less than or equal to 600".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
