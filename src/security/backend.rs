//! Backend collaborator: login, logout and current-user endpoints
//!
//! The coordinator talks to the server through the [`AuthBackend`] trait.
//! [`HttpBackend`] is the production implementation over `reqwest`; tests
//! substitute scripted implementations.
//!
//! # Wire format
//!
//! | Operation | Request | Response body |
//! |---|---|---|
//! | login | `POST {base}/login` with `{"email", "password"}` | `{"user": <identity or null>}` |
//! | logout | `POST {base}/logout` | ignored |
//! | current user | `GET {base}/current-user` | `{"user": <identity or null>}` |

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::BackendConfig;
use crate::error::{GatekeeperError, Result};
use crate::security::session::Identity;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Identifier and secret posted to the login endpoint.
///
/// The `Debug` output never includes the password.
///
/// # Examples
///
/// ```
/// use gatekeeper::security::backend::Credentials;
///
/// let creds = Credentials::new("jo@example.com", "hunter2");
/// assert!(!format!("{creds:?}").contains("hunter2"));
/// ```
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// AuthBackend
// ---------------------------------------------------------------------------

/// Server operations the coordinator depends on.
///
/// Every method reports transport and server failures as errors; a
/// successful response that names no user is `Ok(None)`, not an error.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Submits credentials and returns the identity the server now reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it with a
    /// non-success status.
    async fn login(&self, credentials: &Credentials) -> Result<Option<Identity>>;

    /// Ends the server-side session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    async fn logout(&self) -> Result<()>;

    /// Asks the server who is logged in, possibly from a previous session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    async fn current_user(&self) -> Result<Option<Identity>>;
}

/// `{"user": ...}` envelope shared by login and current-user responses.
#[derive(Debug, Deserialize)]
struct UserEnvelope {
    #[serde(default)]
    user: Option<Identity>,
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

/// [`AuthBackend`] over HTTP.
///
/// The underlying client keeps cookies, so the session established by
/// `login` is presented on later `current_user` and `logout` calls.
///
/// # Examples
///
/// ```
/// use gatekeeper::config::BackendConfig;
/// use gatekeeper::security::backend::HttpBackend;
///
/// let backend = HttpBackend::new(&BackendConfig::default()).unwrap();
/// assert_eq!(backend.base_url().as_str(), "http://localhost:3000/");
/// ```
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: Url,
    login_path: String,
    logout_path: String,
    current_user_path: String,
}

impl HttpBackend {
    /// Builds a backend with its own cookie-keeping client.
    ///
    /// # Errors
    ///
    /// Returns [`GatekeeperError::Config`] if `base_url` does not parse, or
    /// [`GatekeeperError::Http`] if the client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(GatekeeperError::Http)?;
        Self::with_client(http, config)
    }

    /// Builds a backend on an existing client.
    ///
    /// # Errors
    ///
    /// Returns [`GatekeeperError::Config`] if `base_url` does not parse.
    pub fn with_client(http: reqwest::Client, config: &BackendConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            GatekeeperError::Config(format!("invalid backend base_url {}: {e}", config.base_url))
        })?;
        Ok(Self {
            http,
            base_url,
            login_path: config.login_path.clone(),
            logout_path: config.logout_path.clone(),
            current_user_path: config.current_user_path.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends `path` to the base URL, keeping any path prefix the base has.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| {
            GatekeeperError::Config(format!("invalid endpoint path {path}: {e}")).into()
        })
    }

    /// Fails with [`GatekeeperError::Backend`] on a non-success status.
    async fn check_status(
        operation: &'static str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        tracing::warn!(operation, status, "Backend rejected request");
        Err(GatekeeperError::Backend {
            operation,
            status,
            message,
        }
        .into())
    }

    async fn read_user(resp: reqwest::Response) -> Result<Option<Identity>> {
        let envelope: UserEnvelope = resp.json().await.map_err(GatekeeperError::Http)?;
        Ok(envelope.user)
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(&self, credentials: &Credentials) -> Result<Option<Identity>> {
        let url = self.endpoint(&self.login_path)?;
        tracing::debug!(%url, email = %credentials.email, "Posting login");
        let resp = self
            .http
            .post(url)
            .json(credentials)
            .send()
            .await
            .map_err(GatekeeperError::Http)?;
        let resp = Self::check_status("login", resp).await?;
        Self::read_user(resp).await
    }

    async fn logout(&self) -> Result<()> {
        let url = self.endpoint(&self.logout_path)?;
        tracing::debug!(%url, "Posting logout");
        let resp = self
            .http
            .post(url)
            .send()
            .await
            .map_err(GatekeeperError::Http)?;
        Self::check_status("logout", resp).await?;
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<Identity>> {
        let url = self.endpoint(&self.current_user_path)?;
        tracing::debug!(%url, "Requesting current user");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(GatekeeperError::Http)?;
        let resp = Self::check_status("current-user", resp).await?;
        Self::read_user(resp).await
    }
}
