use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gatekeeper::config::BackendConfig;
use gatekeeper::security::{
    AuthCoordinator, ChannelLoginUi, HttpBackend, LoginPromptEvent, MemoryNavigator,
};

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Backend configuration pointing at a mock server.
#[allow(dead_code)]
pub fn backend_config(server: &MockServer) -> BackendConfig {
    BackendConfig {
        base_url: server.uri(),
        timeout_seconds: 5,
        ..BackendConfig::default()
    }
}

/// `{"user": ...}` body for a regular user.
#[allow(dead_code)]
pub fn user_body(email: &str) -> serde_json::Value {
    serde_json::json!({
        "user": {
            "id": "u-1",
            "email": email,
            "firstName": "Jo",
            "lastName": "Doe",
            "admin": false
        }
    })
}

/// `{"user": ...}` body for an administrator.
#[allow(dead_code)]
pub fn admin_body(email: &str) -> serde_json::Value {
    serde_json::json!({
        "user": {
            "id": "a-1",
            "email": email,
            "admin": true
        }
    })
}

#[allow(dead_code)]
pub fn anonymous_body() -> serde_json::Value {
    serde_json::json!({ "user": null })
}

/// Mounts `GET /current-user` answering `body`, expected `calls` times.
#[allow(dead_code)]
pub async fn mount_current_user(server: &MockServer, body: serde_json::Value, calls: u64) {
    Mock::given(method("GET"))
        .and(path("/current-user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(calls)
        .mount(server)
        .await;
}

/// Coordinator over [`HttpBackend`] and the pieces a test drives it with.
#[allow(dead_code)]
pub struct HttpHarness {
    pub coordinator: Arc<AuthCoordinator>,
    pub navigator: Arc<MemoryNavigator>,
    pub prompts: UnboundedReceiver<LoginPromptEvent>,
}

#[allow(dead_code)]
pub fn http_harness(server: &MockServer) -> HttpHarness {
    let backend = HttpBackend::new(&backend_config(server)).expect("backend must build");
    let (ui, prompts) = ChannelLoginUi::new();
    let navigator = Arc::new(MemoryNavigator::new("/projects/1"));
    let coordinator = AuthCoordinator::new(Arc::new(backend), Arc::new(ui), navigator.clone(), "/");
    HttpHarness {
        coordinator,
        navigator,
        prompts,
    }
}

/// Polls `condition` until it holds.
///
/// # Panics
///
/// Panics if the condition is still false after five seconds.
#[allow(dead_code)]
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
