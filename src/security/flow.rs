//! Credential-collection flow handle and the UI seam
//!
//! A [`LoginFlow`] is the coordinator's record of the one login prompt that
//! may be open at a time. The prompt itself is rendered by a [`LoginUi`]
//! implementation, which the coordinator tells to show or dismiss; the UI
//! reports the user's answer back through
//! [`AuthCoordinator::login`](super::coordinator::AuthCoordinator::login) or
//! [`AuthCoordinator::cancel_login`](super::coordinator::AuthCoordinator::cancel_login).

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::security::retry_queue::RetryReason;

// ---------------------------------------------------------------------------
// FlowOutcome
// ---------------------------------------------------------------------------

/// How a login flow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    /// The user authenticated; deferred operations are replayed.
    Success,
    /// The user gave up; deferred operations are cancelled.
    Cancelled,
}

impl FlowOutcome {
    /// `true` for [`FlowOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, FlowOutcome::Success)
    }
}

impl From<bool> for FlowOutcome {
    fn from(success: bool) -> Self {
        if success {
            FlowOutcome::Success
        } else {
            FlowOutcome::Cancelled
        }
    }
}

// ---------------------------------------------------------------------------
// LoginFlow
// ---------------------------------------------------------------------------

/// Handle for an open login flow.
///
/// The coordinator holds at most one of these. Closing consumes the handle,
/// so an outcome is recorded exactly once per flow.
#[derive(Debug, Clone)]
pub struct LoginFlow {
    id: u64,
    reason: Option<RetryReason>,
    opened_at: DateTime<Utc>,
}

impl LoginFlow {
    /// Opens a flow record.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatekeeper::security::flow::LoginFlow;
    /// use gatekeeper::security::retry_queue::RetryReason;
    ///
    /// let flow = LoginFlow::open(1, Some(RetryReason::UnauthenticatedClient));
    /// assert_eq!(flow.id(), 1);
    /// assert_eq!(flow.reason(), Some(RetryReason::UnauthenticatedClient));
    /// ```
    pub fn open(id: u64, reason: Option<RetryReason>) -> Self {
        Self {
            id,
            reason,
            opened_at: Utc::now(),
        }
    }

    /// Sequence number of this flow within the coordinator.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Reason of the first deferred operation when the flow opened.
    ///
    /// `None` when the flow was opened directly rather than by a guard.
    pub fn reason(&self) -> Option<RetryReason> {
        self.reason
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Time the flow has been open.
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.opened_at
    }
}

// ---------------------------------------------------------------------------
// LoginUi
// ---------------------------------------------------------------------------

/// Renders the login prompt.
///
/// Both methods are called synchronously by the coordinator while it
/// changes state, so implementations must not call back into the
/// coordinator from inside them. Hand the work to another task instead, as
/// [`ChannelLoginUi`] does.
pub trait LoginUi: Send + Sync {
    /// A flow has opened; present the credential form.
    fn show(&self, flow: &LoginFlow);

    /// The flow has closed with `outcome`; hide the form.
    fn dismiss(&self, flow: &LoginFlow, outcome: FlowOutcome);
}

/// Event emitted by [`ChannelLoginUi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPromptEvent {
    /// Ask the user for credentials.
    Show {
        flow_id: u64,
        reason: Option<RetryReason>,
    },
    /// Stop asking.
    Dismiss { flow_id: u64, outcome: FlowOutcome },
}

/// [`LoginUi`] that forwards show/dismiss requests over an unbounded
/// channel to whatever task owns the terminal or window.
///
/// # Examples
///
/// ```
/// use gatekeeper::security::flow::{ChannelLoginUi, LoginFlow, LoginPromptEvent, LoginUi};
///
/// let (ui, mut events) = ChannelLoginUi::new();
/// ui.show(&LoginFlow::open(7, None));
///
/// assert_eq!(
///     events.try_recv().unwrap(),
///     LoginPromptEvent::Show { flow_id: 7, reason: None }
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ChannelLoginUi {
    events: mpsc::UnboundedSender<LoginPromptEvent>,
}

impl ChannelLoginUi {
    /// Creates the UI and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LoginPromptEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }

    fn emit(&self, event: LoginPromptEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!("Login prompt receiver dropped; event discarded");
        }
    }
}

impl LoginUi for ChannelLoginUi {
    fn show(&self, flow: &LoginFlow) {
        self.emit(LoginPromptEvent::Show {
            flow_id: flow.id(),
            reason: flow.reason(),
        });
    }

    fn dismiss(&self, flow: &LoginFlow, outcome: FlowOutcome) {
        self.emit(LoginPromptEvent::Dismiss {
            flow_id: flow.id(),
            outcome,
        });
    }
}
