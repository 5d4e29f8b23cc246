//! Deferred guard checks waiting on a login flow
//!
//! When a guard fails, its caller is not rejected. Instead a continuation
//! that re-runs the same guard is pushed onto the [`RetryQueue`] and the
//! caller awaits a [`PendingRetry`] until the queue is drained.
//!
//! # Design
//!
//! - Each entry pairs the continuation with a `oneshot::Sender`. The matching
//!   receiver is wrapped in the [`PendingRetry`] handed back to the caller.
//! - A drain takes the whole entry list out under the lock as a
//!   [`RetryBatch`] and settles it after the lock is released. Entries pushed
//!   after that, including by the continuations it replays, land in a fresh
//!   list and belong to the next login cycle.
//! - Replaying sends each continuation's future to its waiter, which drives
//!   it; the queue itself never spawns and needs no runtime. Cancelling
//!   settles every waiter with [`GatekeeperError::Cancelled`] without running
//!   anything.
//! - A single "item added" observer is called after every push, outside the
//!   entry lock, so the observer may query the queue.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::ready;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::{GatekeeperError, Result};
use crate::security::lock;

// ---------------------------------------------------------------------------
// RetryReason
// ---------------------------------------------------------------------------

/// Why a guarded operation was deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryReason {
    /// No identity is known.
    UnauthenticatedClient,
    /// An identity is known but lacks the required privilege.
    UnauthorizedClient,
}

impl RetryReason {
    /// The wire tag for this reason.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatekeeper::security::retry_queue::RetryReason;
    ///
    /// assert_eq!(RetryReason::UnauthenticatedClient.as_str(), "unauthenticated-client");
    /// assert_eq!(RetryReason::UnauthorizedClient.as_str(), "unauthorized-client");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryReason::UnauthenticatedClient => "unauthenticated-client",
            RetryReason::UnauthorizedClient => "unauthorized-client",
        }
    }

    /// Prompt text shown above the login form for this reason.
    pub fn message(&self) -> &'static str {
        match self {
            RetryReason::UnauthenticatedClient => {
                "You must be logged in to access this part of the application."
            }
            RetryReason::UnauthorizedClient => {
                "You do not have the necessary access permissions. Do you want to login as someone else?"
            }
        }
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entries and pending results
// ---------------------------------------------------------------------------

/// A deferred guard check. Called at most once, when its batch is replayed.
pub type RetryFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send + 'static>;

/// Observer called after every push.
type ItemAddedHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// What a drain hands to a waiter.
enum Settlement {
    /// The re-run guard check, driven by the waiter itself.
    Replay(BoxFuture<'static, Result<()>>),
    Cancelled,
}

struct RetryEntry {
    reason: RetryReason,
    retry: RetryFn,
    settle: oneshot::Sender<Settlement>,
}

/// The suspended result of a deferred guard.
///
/// Resolves once the queue is drained: with the replayed guard's own result
/// after [`RetryBatch::retry`], or with [`GatekeeperError::Cancelled`]
/// after [`RetryBatch::cancel`]. If the queue is dropped without
/// draining, the waiter also sees a cancellation, so a `PendingRetry`
/// always resolves.
///
/// A replay runs inside this future, on whatever task awaits it.
#[must_use = "the guarded operation is suspended until this resolves"]
pub struct PendingRetry {
    reason: RetryReason,
    state: PendingState,
}

enum PendingState {
    Queued(oneshot::Receiver<Settlement>),
    Replaying(BoxFuture<'static, Result<()>>),
}

impl PendingRetry {
    /// Reason the operation was deferred.
    pub fn reason(&self) -> RetryReason {
        self.reason
    }
}

impl fmt::Debug for PendingRetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            PendingState::Queued(_) => "queued",
            PendingState::Replaying(_) => "replaying",
        };
        f.debug_struct("PendingRetry")
            .field("reason", &self.reason)
            .field("state", &state)
            .finish()
    }
}

impl Future for PendingRetry {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            let settled = match &mut this.state {
                PendingState::Replaying(replay) => return replay.as_mut().poll(cx),
                PendingState::Queued(receiver) => ready!(Pin::new(receiver).poll(cx)),
            };
            match settled {
                Ok(Settlement::Replay(replay)) => this.state = PendingState::Replaying(replay),
                Ok(Settlement::Cancelled) | Err(_) => {
                    return Poll::Ready(Err(GatekeeperError::Cancelled(this.reason).into()))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RetryBatch
// ---------------------------------------------------------------------------

/// Entries removed from the queue by one drain.
///
/// Taking the batch and settling it are separate steps so a caller can take
/// it under its own lock and settle it after releasing that lock. A batch
/// dropped unsettled cancels its waiters.
#[must_use = "dropping a batch cancels its waiters"]
pub struct RetryBatch {
    entries: Vec<RetryEntry>,
}

impl fmt::Debug for RetryBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryBatch")
            .field("len", &self.len())
            .finish()
    }
}

impl RetryBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invokes every continuation and hands the resulting future to its
    /// waiter, which drives it to completion.
    ///
    /// # Returns
    ///
    /// The number of continuations replayed.
    pub fn retry(self) -> usize {
        let count = self.entries.len();
        if count > 0 {
            tracing::info!(count, "Replaying deferred operations");
        }

        for entry in self.entries {
            let RetryEntry {
                reason,
                retry,
                settle,
            } = entry;
            if settle.send(Settlement::Replay(retry())).is_err() {
                tracing::debug!(%reason, "Replayed operation no longer awaited");
            }
        }
        count
    }

    /// Settles every waiter with [`GatekeeperError::Cancelled`] carrying the
    /// reason its own entry was queued with. Nothing is invoked.
    ///
    /// # Returns
    ///
    /// The number of continuations cancelled.
    pub fn cancel(self) -> usize {
        let count = self.entries.len();
        if count > 0 {
            tracing::info!(count, "Cancelling deferred operations");
        }

        for entry in self.entries {
            let _ = entry.settle.send(Settlement::Cancelled);
        }
        count
    }
}

// ---------------------------------------------------------------------------
// RetryQueue
// ---------------------------------------------------------------------------

/// Ordered set of guard continuations blocked on authorization.
///
/// # Examples
///
/// ```
/// use futures::FutureExt;
/// use gatekeeper::security::retry_queue::{RetryQueue, RetryReason};
///
/// # fn main() -> anyhow::Result<()> {
/// let queue = RetryQueue::new();
/// let pending = queue.push_retry_fn(RetryReason::UnauthenticatedClient, || {
///     async { Ok(()) }.boxed()
/// });
///
/// assert_eq!(queue.retry_reason(), Some(RetryReason::UnauthenticatedClient));
/// assert_eq!(queue.retry_all(), 1);
/// futures::executor::block_on(pending)?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct RetryQueue {
    entries: Mutex<Vec<RetryEntry>>,
    on_item_added: Mutex<Option<ItemAddedHandler>>,
}

impl fmt::Debug for RetryQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryQueue")
            .field("len", &self.len())
            .field("retry_reason", &self.retry_reason())
            .finish_non_exhaustive()
    }
}

impl RetryQueue {
    /// Creates an empty queue with no observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the observer called after every push, replacing any
    /// previous one.
    ///
    /// The observer runs synchronously inside
    /// [`push_retry_fn`](Self::push_retry_fn), after the entry has been
    /// stored and the entry lock released.
    pub fn set_item_added_handler<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *lock(&self.on_item_added) = Some(Arc::new(handler));
    }

    /// Defers `retry` until the queue is drained.
    ///
    /// # Arguments
    ///
    /// * `reason` - Why the guarded operation was blocked.
    /// * `retry` - Re-runs the guarded check; invoked at most once.
    ///
    /// # Returns
    ///
    /// A [`PendingRetry`] that settles when the queue is drained.
    pub fn push_retry_fn<F>(&self, reason: RetryReason, retry: F) -> PendingRetry
    where
        F: FnOnce() -> BoxFuture<'static, Result<()>> + Send + 'static,
    {
        let (settle, receiver) = oneshot::channel();
        let queued = {
            let mut entries = lock(&self.entries);
            entries.push(RetryEntry {
                reason,
                retry: Box::new(retry),
                settle,
            });
            entries.len()
        };
        tracing::debug!(%reason, queued, "Guarded operation deferred");

        let handler = lock(&self.on_item_added).clone();
        if let Some(handler) = handler {
            handler();
        }

        PendingRetry {
            reason,
            state: PendingState::Queued(receiver),
        }
    }

    /// `true` while at least one continuation is queued.
    pub fn has_more(&self) -> bool {
        !lock(&self.entries).is_empty()
    }

    /// Number of queued continuations.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        !self.has_more()
    }

    /// Reason of the earliest queued continuation, or `None` when empty.
    pub fn retry_reason(&self) -> Option<RetryReason> {
        lock(&self.entries).first().map(|entry| entry.reason)
    }

    /// Removes every queued entry in one step.
    ///
    /// The queue is empty afterwards; anything pushed later, including by
    /// the continuations in this batch, starts a new cycle.
    pub fn take_batch(&self) -> RetryBatch {
        RetryBatch {
            entries: std::mem::take(&mut *lock(&self.entries)),
        }
    }

    /// Drains the queue and replays every continuation.
    ///
    /// See [`RetryBatch::retry`].
    pub fn retry_all(&self) -> usize {
        self.take_batch().retry()
    }

    /// Drains the queue without replaying anything.
    ///
    /// See [`RetryBatch::cancel`].
    pub fn cancel_all(&self) -> usize {
        self.take_batch().cancel()
    }
}
