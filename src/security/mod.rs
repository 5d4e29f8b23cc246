//! Client-side authentication gatekeeping
//!
//! Guards check whether the current user may proceed. A guard that fails
//! does not error out: its caller is parked in a retry queue, a single
//! login prompt is raised no matter how many callers are parked, and every
//! parked caller is replayed or cancelled together once the prompt resolves.
//!
//! # Module Layout
//!
//! - [`session`]     -- Known identity and its authorization predicates
//! - [`retry_queue`] -- Deferred guard continuations and their pending results
//! - [`flow`]        -- Login flow handle and the UI seam
//! - [`navigation`]  -- Navigation seam
//! - [`backend`]     -- Login/logout/current-user endpoints
//! - [`coordinator`] -- State machine tying the above together

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod backend;
pub mod coordinator;
pub mod flow;
pub mod navigation;
pub mod retry_queue;
pub mod session;

pub use backend::{AuthBackend, Credentials, HttpBackend};
pub use coordinator::AuthCoordinator;
pub use flow::{ChannelLoginUi, FlowOutcome, LoginFlow, LoginPromptEvent, LoginUi};
pub use navigation::{MemoryNavigator, Navigator};
pub use retry_queue::{PendingRetry, RetryBatch, RetryQueue, RetryReason};
pub use session::{Identity, SessionState};

/// Locks `mutex`, recovering the data if a previous holder panicked.
///
/// None of the state guarded here can be left half-updated by a panic, so
/// the poison flag carries no information.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
