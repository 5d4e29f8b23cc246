//! Test utilities for Gatekeeper
//!
//! This module provides a scripted in-memory backend, a cooperative wait
//! helper, temporary directory management, and assertion helpers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::config::Config;
use crate::error::{GatekeeperError, Result};
use crate::security::backend::{AuthBackend, Credentials};
use crate::security::session::Identity;

/// Create a temporary directory for testing
///
/// # Returns
///
/// Returns a TempDir that will be cleaned up when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Create a test configuration with default values
pub fn test_config() -> Config {
    Config::default()
}

/// Create a test configuration YAML string
pub fn test_config_yaml() -> String {
    r#"
backend:
  base_url: http://127.0.0.1:8080/api
  login_path: /login
  logout_path: /logout
  current_user_path: /current-user
  timeout_seconds: 5

navigation:
  default_path: /home
"#
    .to_string()
}

/// Yields to the runtime until `condition` holds.
///
/// Spawned guards only make progress when the test task yields, so tests
/// use this to let them reach the retry queue.
///
/// # Panics
///
/// Panics if the condition is still false after 100 yields.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached after 100 yields");
}

/// Sleeps in short steps until `condition` holds.
///
/// For multi-threaded tests, where the work being waited on may be blocked
/// on another thread rather than on the test task.
///
/// # Panics
///
/// Panics if the condition is still false after five seconds.
pub async fn wait_for<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 5s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// In-memory [`AuthBackend`] with a fixed set of accounts.
///
/// Successful logins become the "server-side" current user, which the
/// lookup then reports. Each operation can be switched to fail with a
/// backend error.
#[derive(Default)]
pub struct ScriptedBackend {
    accounts: HashMap<String, (String, Identity)>,
    current: Mutex<Option<Identity>>,
    lookup_calls: AtomicUsize,
    login_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    fail_lookup: AtomicBool,
    fail_login: AtomicBool,
    fail_logout: AtomicBool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, email: &str, password: &str, identity: Identity) -> Self {
        self.accounts
            .insert(email.to_string(), (password.to_string(), identity));
        self
    }

    /// Sets the user the server reports on the next lookup.
    pub fn set_current_user(&self, identity: Option<Identity>) {
        *self.current.lock().unwrap() = identity;
    }

    pub fn fail_lookup(&self, fail: bool) {
        self.fail_lookup.store(fail, Ordering::SeqCst);
    }

    pub fn fail_login(&self, fail: bool) {
        self.fail_login.store(fail, Ordering::SeqCst);
    }

    pub fn fail_logout(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::SeqCst);
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    fn unavailable(operation: &'static str) -> anyhow::Error {
        GatekeeperError::Backend {
            operation,
            status: 503,
            message: "scripted outage".to_string(),
        }
        .into()
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn login(&self, credentials: &Credentials) -> Result<Option<Identity>> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(Self::unavailable("login"));
        }
        let identity = self
            .accounts
            .get(&credentials.email)
            .filter(|(password, _)| *password == credentials.password)
            .map(|(_, identity)| identity.clone());
        *self.current.lock().unwrap() = identity.clone();
        Ok(identity)
    }

    async fn logout(&self) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(Self::unavailable("logout"));
        }
        *self.current.lock().unwrap() = None;
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<Identity>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(Self::unavailable("current-user"));
        }
        Ok(self.current.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_create_test_file() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "test.txt", "content");
        assert!(path.exists());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "content");
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<()> = Err(GatekeeperError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        assert_error_contains(Ok(()), "error");
    }

    #[test]
    fn test_test_config_yaml() {
        let yaml = test_config_yaml();
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.navigation.default_path, "/home");
        assert!(test_config().validate().is_ok());
    }

    #[tokio::test]
    async fn test_scripted_backend_login_sets_current_user() {
        let backend = ScriptedBackend::new().with_account("a@b.c", "pw", Identity::with_email("a@b.c"));

        let nobody = backend.login(&Credentials::new("a@b.c", "nope")).await.unwrap();
        assert!(nobody.is_none());

        let someone = backend.login(&Credentials::new("a@b.c", "pw")).await.unwrap();
        assert!(someone.is_some());
        assert!(backend.current_user().await.unwrap().is_some());
        assert_eq!(backend.login_calls(), 2);
        assert_eq!(backend.lookup_calls(), 1);

        backend.logout().await.unwrap();
        assert!(backend.current_user().await.unwrap().is_none());
    }
}
