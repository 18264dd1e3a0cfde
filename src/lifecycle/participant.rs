//! Shutdown participants.
//!
//! Four of the five participant kinds share a single capability: a blocking
//! `close()`. Cleanup callbacks are the one exception and are plain deferred
//! actions.

use std::fmt;
use std::sync::Arc;

/// Boxed error returned by participants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Deferred cleanup action, run once during the last phase.
pub type CleanupFn = Box<dyn FnOnce() -> Result<(), BoxError> + Send + 'static>;

/// A resource that can be stopped during shutdown.
///
/// `close()` is allowed to block. The coordinator always calls it from the
/// blocking thread pool, never from an async worker thread.
pub trait Stoppable: Send + Sync + 'static {
    /// Stop the resource. Called at most once by the coordinator.
    fn close(&self) -> Result<(), BoxError>;

    /// Name used in logs and errors.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Participant category. Determines which phase tears it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantKind {
    Server,
    Listener,
    Client,
    IdentityProvider,
    Cleanup,
}

impl ParticipantKind {
    /// Stable snake_case label for metrics. Error messages use the
    /// [`Display`](fmt::Display) form, which is worded for people and differs
    /// for identity providers and cleanups.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantKind::Server => "server",
            ParticipantKind::Listener => "listener",
            ParticipantKind::Client => "client",
            ParticipantKind::IdentityProvider => "identity_provider",
            ParticipantKind::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParticipantKind::Server => "server",
            ParticipantKind::Listener => "listener",
            ParticipantKind::Client => "client",
            ParticipantKind::IdentityProvider => "identity provider",
            ParticipantKind::Cleanup => "cleanup callback",
        };
        f.write_str(label)
    }
}

/// Closure-backed participant, see [`stoppable_fn`].
pub struct FnStoppable<F> {
    name: String,
    close: F,
}

impl<F> Stoppable for FnStoppable<F>
where
    F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn close(&self) -> Result<(), BoxError> {
        (self.close)()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnStoppable<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStoppable").field("name", &self.name).finish()
    }
}

/// Wrap a closure as a named participant.
///
/// Handy for resources that expose a close method but no [`Stoppable`] impl,
/// such as third-party connection pools.
pub fn stoppable_fn<F>(name: impl Into<String>, close: F) -> Arc<FnStoppable<F>>
where
    F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(FnStoppable {
        name: name.into(),
        close,
    })
}
