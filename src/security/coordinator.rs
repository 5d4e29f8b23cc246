//! Authentication coordinator
//!
//! [`AuthCoordinator`] is the public face of the gatekeeper. Application
//! code calls its guards before entering protected routes, and the login UI
//! calls [`login`](AuthCoordinator::login) and
//! [`cancel_login`](AuthCoordinator::cancel_login) with the user's answer.
//!
//! # State machine
//!
//! ```text
//!            guard fails: push + open flow
//!   IDLE ---------------------------------> COLLECTING --+
//!    ^                                          |        | guard fails again:
//!    |   login succeeds: close, replay batch    |        | push, flow already open
//!    +------------------------------------------+ <------+
//!    |   cancel_login: close, cancel batch,     |
//!    +---------- redirect to default -----------+
//! ```
//!
//! The coordinator owns the [`SessionState`], the [`RetryQueue`] and the
//! single optional [`LoginFlow`]. It registers one "item added" observer on
//! the queue that opens a flow unless one is already open, which is what
//! keeps the login prompt a singleton however many guards fail at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::config::Config;
use crate::error::{GatekeeperError, Result};
use crate::security::backend::{AuthBackend, Credentials, HttpBackend};
use crate::security::flow::{FlowOutcome, LoginFlow, LoginUi};
use crate::security::lock;
use crate::security::navigation::Navigator;
use crate::security::retry_queue::{RetryQueue, RetryReason};
use crate::security::session::{Identity, SessionState};

/// Default location used when none is configured or requested.
pub const DEFAULT_REDIRECT_PATH: &str = "/";

/// What a guard demands of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    Authenticated,
    Admin,
}

impl Requirement {
    fn is_met(&self, session: &SessionState) -> bool {
        match self {
            Requirement::Authenticated => session.is_authenticated(),
            Requirement::Admin => session.is_admin(),
        }
    }

    fn reason(&self) -> RetryReason {
        match self {
            Requirement::Authenticated => RetryReason::UnauthenticatedClient,
            Requirement::Admin => RetryReason::UnauthorizedClient,
        }
    }
}

/// Coordinates guards, the retry queue, the login flow and the session.
///
/// Always handled through an `Arc`: guards capture a clone so that their
/// continuations can re-run them after the coordinator's caller has moved
/// on.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use gatekeeper::config::Config;
/// use gatekeeper::security::{AuthCoordinator, ChannelLoginUi, MemoryNavigator};
///
/// # async fn example() -> gatekeeper::error::Result<()> {
/// let (ui, _prompts) = ChannelLoginUi::new();
/// let coordinator = AuthCoordinator::from_config(
///     &Config::default(),
///     Arc::new(ui),
///     Arc::new(MemoryNavigator::new("/")),
/// )?;
///
/// // Suspends until the user logs in through the prompt (or cancels it).
/// coordinator.require_authenticated_user().await?;
/// # Ok(())
/// # }
/// ```
pub struct AuthCoordinator {
    backend: Arc<dyn AuthBackend>,
    ui: Arc<dyn LoginUi>,
    navigator: Arc<dyn Navigator>,
    default_path: String,
    session: Mutex<SessionState>,
    queue: RetryQueue,
    flow: Mutex<Option<LoginFlow>>,
    next_flow_id: AtomicU64,
}

impl std::fmt::Debug for AuthCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = lock(&self.session).clone();
        let flow = lock(&self.flow).clone();
        f.debug_struct("AuthCoordinator")
            .field("default_path", &self.default_path)
            .field("session", &session)
            .field("queue", &self.queue)
            .field("flow", &flow)
            .finish_non_exhaustive()
    }
}

impl AuthCoordinator {
    /// Creates a coordinator with an empty session and no open flow.
    ///
    /// # Arguments
    ///
    /// * `backend` - Login/logout/current-user endpoints.
    /// * `ui` - Renders the login prompt.
    /// * `navigator` - Moves the application after cancel and logout.
    /// * `default_path` - Where cancel and logout land by default.
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        ui: Arc<dyn LoginUi>,
        navigator: Arc<dyn Navigator>,
        default_path: impl Into<String>,
    ) -> Arc<Self> {
        let coordinator = Arc::new(Self {
            backend,
            ui,
            navigator,
            default_path: default_path.into(),
            session: Mutex::new(SessionState::new()),
            queue: RetryQueue::new(),
            flow: Mutex::new(None),
            next_flow_id: AtomicU64::new(1),
        });

        let weak = Arc::downgrade(&coordinator);
        coordinator.queue.set_item_added_handler(move || {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.open_flow_for_pending();
            }
        });

        coordinator
    }

    /// Creates a coordinator backed by [`HttpBackend`] as configured.
    ///
    /// # Errors
    ///
    /// Returns [`GatekeeperError::Config`] if the backend URL is invalid.
    pub fn from_config(
        config: &Config,
        ui: Arc<dyn LoginUi>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Arc<Self>> {
        let backend = HttpBackend::new(&config.backend)?;
        Ok(Self::new(
            Arc::new(backend),
            ui,
            navigator,
            config.navigation.default_path.clone(),
        ))
    }

    // -----------------------------------------------------------------------
    // Information for the UI
    // -----------------------------------------------------------------------

    /// Reason of the first operation waiting on a login, if any.
    pub fn login_reason(&self) -> Option<RetryReason> {
        self.queue.retry_reason()
    }

    /// Snapshot of the known identity.
    pub fn current_user(&self) -> Option<Identity> {
        lock(&self.session).identity().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.session).is_authenticated()
    }

    pub fn is_admin(&self) -> bool {
        lock(&self.session).is_admin()
    }

    /// `true` while a login flow is open.
    pub fn is_login_open(&self) -> bool {
        lock(&self.flow).is_some()
    }

    /// Number of guarded operations waiting on the current flow.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    // -----------------------------------------------------------------------
    // Login flow
    // -----------------------------------------------------------------------

    /// Opens the login flow.
    ///
    /// # Returns
    ///
    /// `true` if a flow was opened, `false` if one was already open.
    pub fn show_login(&self) -> bool {
        let mut flow = lock(&self.flow);
        self.open_flow(&mut flow)
    }

    /// Opens a flow if entries are waiting and none is open.
    ///
    /// The queue is checked under the flow lock, so an entry drained by a
    /// closing flow cannot open a new one.
    fn open_flow_for_pending(&self) {
        let mut flow = lock(&self.flow);
        if flow.is_none() && self.queue.has_more() {
            self.open_flow(&mut flow);
        }
    }

    fn open_flow(&self, flow: &mut Option<LoginFlow>) -> bool {
        if let Some(open) = flow.as_ref() {
            tracing::debug!(flow_id = open.id(), "Login flow already open");
            return false;
        }

        let opened = LoginFlow::open(
            self.next_flow_id.fetch_add(1, Ordering::SeqCst),
            self.queue.retry_reason(),
        );
        tracing::info!(
            flow_id = opened.id(),
            reason = ?opened.reason(),
            "Opening login flow"
        );
        self.ui.show(&opened);
        *flow = Some(opened);
        true
    }

    /// Submits credentials to the backend.
    ///
    /// The session is replaced with whatever identity the backend returns.
    /// If that makes the user authenticated, the open flow (if any) closes
    /// as a success and every waiting guard is replayed.
    ///
    /// # Returns
    ///
    /// `true` if the user is now authenticated, `false` if the backend
    /// answered without a user (bad credentials). The flow stays open in
    /// the latter case.
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged. Neither the session nor the
    /// retry queue is touched.
    pub async fn login(&self, credentials: &Credentials) -> Result<bool> {
        let identity = self.backend.login(credentials).await?;
        let authenticated = {
            let mut session = lock(&self.session);
            session.update(identity);
            session.is_authenticated()
        };

        if authenticated {
            tracing::info!(email = %credentials.email, "Login succeeded");
            self.close_login_flow(FlowOutcome::Success);
        } else {
            tracing::warn!(email = %credentials.email, "Login rejected by backend");
        }
        Ok(authenticated)
    }

    /// Abandons the login flow.
    ///
    /// Every waiting guard resolves with [`GatekeeperError::Cancelled`] and
    /// the application is sent to the default location. Also navigates
    /// there when no flow was open.
    pub fn cancel_login(&self) {
        if !self.close_login_flow(FlowOutcome::Cancelled) {
            self.navigator.redirect(&self.default_path);
        }
    }

    /// Ends the session on the backend, then locally.
    ///
    /// The retry queue is left alone: guards waiting on an open flow keep
    /// waiting for it.
    ///
    /// # Arguments
    ///
    /// * `redirect_to` - Where to go afterwards, handed to the navigator
    ///   as given; the default location when `None`.
    ///
    /// # Errors
    ///
    /// Returns the backend error if logout fails. The session is kept and
    /// nothing is navigated.
    pub async fn logout(&self, redirect_to: Option<&str>) -> Result<()> {
        self.backend.logout().await?;
        lock(&self.session).clear();
        tracing::info!("Logged out");
        self.navigator.redirect(redirect_to.unwrap_or(&self.default_path));
        Ok(())
    }

    /// Closes the open flow with `outcome` and settles everything queued
    /// on it.
    ///
    /// The flow slot is cleared and the queue drained under the flow lock,
    /// so a guard failing meanwhile is either part of this batch or starts
    /// the next flow. The batch is settled after the lock is released.
    ///
    /// Returns `false` if no flow was open.
    fn close_login_flow(&self, outcome: FlowOutcome) -> bool {
        let batch = {
            let mut slot = lock(&self.flow);
            let Some(flow) = slot.take() else {
                return false;
            };
            let batch = self.queue.take_batch();
            tracing::info!(
                flow_id = flow.id(),
                ?outcome,
                waiting = batch.len(),
                open_ms = flow.elapsed().num_milliseconds(),
                "Login flow closed"
            );
            self.ui.dismiss(&flow, outcome);
            batch
        };

        match outcome {
            FlowOutcome::Success => {
                batch.retry();
            }
            FlowOutcome::Cancelled => {
                batch.cancel();
                self.navigator.redirect(&self.default_path);
            }
        }
        true
    }

    // -----------------------------------------------------------------------
    // Guards
    // -----------------------------------------------------------------------

    /// Resolves once a user is logged in.
    ///
    /// Resolves immediately when the session (or a fresh lookup) shows a
    /// user. Otherwise the check is deferred with reason
    /// `unauthenticated-client`, a login flow is raised if none is open,
    /// and the returned future waits until that flow resolves.
    ///
    /// # Errors
    ///
    /// Returns the lookup error if the backend cannot be reached, or
    /// [`GatekeeperError::Cancelled`] if the login flow is abandoned.
    pub fn require_authenticated_user(self: &Arc<Self>) -> BoxFuture<'static, Result<()>> {
        self.require(Requirement::Authenticated)
    }

    /// Resolves once an administrator is logged in.
    ///
    /// Same as [`require_authenticated_user`](Self::require_authenticated_user)
    /// with reason `unauthorized-client`.
    ///
    /// # Errors
    ///
    /// Returns the lookup error if the backend cannot be reached, or
    /// [`GatekeeperError::Cancelled`] if the login flow is abandoned.
    pub fn require_admin_user(self: &Arc<Self>) -> BoxFuture<'static, Result<()>> {
        self.require(Requirement::Admin)
    }

    fn require(self: &Arc<Self>, requirement: Requirement) -> BoxFuture<'static, Result<()>> {
        let coordinator = Arc::clone(self);
        async move {
            let session = coordinator.request_current_user().await?;
            if requirement.is_met(&session) {
                return Ok(());
            }

            let reason = requirement.reason();
            tracing::debug!(%reason, "Guard failed; deferring");
            let retry = Arc::clone(&coordinator);
            coordinator
                .queue
                .push_retry_fn(reason, move || retry.require(requirement))
                .await
        }
        .boxed()
    }

    /// Returns the session, probing the backend unless a user is known.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the lookup fails; nothing is queued.
    pub async fn request_current_user(&self) -> Result<SessionState> {
        let cached = {
            let session = lock(&self.session);
            session.is_authenticated().then(|| session.clone())
        };
        if let Some(session) = cached {
            return Ok(session);
        }

        let identity = self.backend.current_user().await?;
        let mut session = lock(&self.session);
        session.update(identity);
        Ok(session.clone())
    }

    /// Picks up a session left over from a previous run.
    ///
    /// Lookup failures are logged and otherwise ignored: nobody is waiting
    /// on this call, and the next guard looks up again.
    pub async fn restore_session(&self) {
        match self.request_current_user().await {
            Ok(session) => match session.identity() {
                Some(identity) => {
                    tracing::info!(user = %identity.display_name(), "Restored session")
                }
                None => tracing::debug!("No previous session"),
            },
            Err(e) => tracing::warn!("Could not restore session: {e}"),
        }
    }
}
