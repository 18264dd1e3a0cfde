//! Deadline and cancellation carried into a shutdown.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`ShutdownContext`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The deadline passed.
    DeadlineExceeded,
    /// The context, or one of its ancestors, was cancelled explicitly.
    Cancelled,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::DeadlineExceeded => f.write_str("deadline exceeded"),
            CancelCause::Cancelled => f.write_str("context cancelled"),
        }
    }
}

/// Optional deadline plus a cancellation token.
///
/// Children derived with [`child_with_timeout`](Self::child_with_timeout) are
/// cancelled with their parent and never outlive the parent's deadline.
#[derive(Debug, Clone)]
pub struct ShutdownContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl ShutdownContext {
    /// A context that never expires on its own.
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: CancellationToken::new(),
        }
    }

    /// Replace the cancellation token, e.g. to tie the shutdown to an
    /// application-wide token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Derive a child bounded by `budget`.
    ///
    /// The child deadline is `min(parent deadline, now + budget)`.
    pub fn child_with_timeout(&self, budget: Duration) -> Self {
        let candidate = Instant::now() + budget;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            token: self.token.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> CancelCause {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => CancelCause::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelCause::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelCause::Cancelled
            }
        }
    }
}

impl Default for ShutdownContext {
    fn default() -> Self {
        Self::background()
    }
}
