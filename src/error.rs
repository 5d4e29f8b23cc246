//! Error types for Gatekeeper
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::security::retry_queue::RetryReason;

/// Main error type for Gatekeeper operations
///
/// Guard failures are not errors: a guard that fails its check waits in the
/// retry queue instead. What reaches callers is a backend failure on the
/// operation they invoked, or a cancellation when the user abandons the
/// login flow their guard was waiting on.
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend returned a non-success status for an operation
    #[error("Backend error during {operation}: status={status}, {message}")]
    Backend {
        /// Backend operation that failed (login, logout, current-user)
        operation: &'static str,
        /// HTTP status code returned by the backend
        status: u16,
        /// Response body or additional context
        message: String,
    },

    /// The login flow was abandoned while a guard was waiting on it
    #[error("Login cancelled: {0}")]
    Cancelled(RetryReason),

    /// Navigation collaborator rejected a location
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Gatekeeper operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Returns `true` when `error` is a login cancellation.
///
/// Guards resolve with this error after [`cancel_login`] or any other
/// failed flow; callers typically treat it as "stay where you are" rather
/// than as a fault.
///
/// [`cancel_login`]: crate::security::coordinator::AuthCoordinator::cancel_login
///
/// # Examples
///
/// ```
/// use gatekeeper::error::{is_cancellation, GatekeeperError};
/// use gatekeeper::security::retry_queue::RetryReason;
///
/// let err: anyhow::Error = GatekeeperError::Cancelled(RetryReason::UnauthenticatedClient).into();
/// assert!(is_cancellation(&err));
/// ```
pub fn is_cancellation(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<GatekeeperError>(),
        Some(GatekeeperError::Cancelled(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = GatekeeperError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_backend_error_display() {
        let error = GatekeeperError::Backend {
            operation: "login",
            status: 401,
            message: "bad credentials".to_string(),
        };
        let s = error.to_string();
        assert!(s.contains("login"));
        assert!(s.contains("status=401"));
        assert!(s.contains("bad credentials"));
    }

    #[test]
    fn test_cancelled_error_display_names_reason() {
        let error = GatekeeperError::Cancelled(RetryReason::UnauthorizedClient);
        assert_eq!(error.to_string(), "Login cancelled: unauthorized-client");
    }

    #[test]
    fn test_navigation_error_display() {
        let error = GatekeeperError::Navigation("relative path".to_string());
        assert_eq!(error.to_string(), "Navigation error: relative path");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: GatekeeperError = io_error.into();
        assert!(matches!(error, GatekeeperError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: GatekeeperError = json_error.into();
        assert!(matches!(error, GatekeeperError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: GatekeeperError = yaml_error.into();
        assert!(matches!(error, GatekeeperError::Yaml(_)));
    }

    #[test]
    fn test_is_cancellation_rejects_other_errors() {
        let err: anyhow::Error = GatekeeperError::Config("x".to_string()).into();
        assert!(!is_cancellation(&err));

        let err = anyhow::anyhow!("plain");
        assert!(!is_cancellation(&err));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GatekeeperError>();
    }
}
