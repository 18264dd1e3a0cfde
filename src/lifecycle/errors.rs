//! Shutdown error taxonomy and the error aggregator.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::lifecycle::context::CancelCause;
use crate::lifecycle::participant::ParticipantKind;

/// Shared, cloneable participant error.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// A single failure recorded during shutdown.
#[derive(Debug, Clone, Error)]
pub enum CloseError {
    /// The participant's own `close()` returned an error.
    #[error("{kind} `{name}` close error: {source}")]
    Failed {
        kind: ParticipantKind,
        name: String,
        #[source]
        source: SharedError,
    },

    /// The participant did not close before its phase deadline.
    #[error("{kind} `{name}` close timed out: {cause}")]
    TimedOut {
        kind: ParticipantKind,
        name: String,
        cause: CancelCause,
    },

    /// The participant panicked while closing.
    #[error("{kind} `{name}` panicked while closing: {message}")]
    Panicked {
        kind: ParticipantKind,
        name: String,
        message: String,
    },

    /// The server and listener barrier expired before every close reported.
    /// `abandoned` closes were still running and carry no error of their own.
    #[error("grace period exceeded: {abandoned} servers and listeners still closing after {budget:?}")]
    PhaseTimeout { budget: Duration, abandoned: usize },

    /// A cleanup callback returned an error. `index` is 1-based.
    #[error("cleanup callback #{index} failed: {source}")]
    CleanupFailed {
        index: usize,
        #[source]
        source: SharedError,
    },

    /// The shutdown sequence itself stopped before finishing.
    #[error("shutdown sequence interrupted: {message}")]
    Interrupted { message: String },
}

impl CloseError {
    pub fn failed(
        kind: ParticipantKind,
        name: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        CloseError::Failed {
            kind,
            name: name.into(),
            source: Arc::from(source),
        }
    }

    /// Participant kind, when the error belongs to one.
    pub fn kind(&self) -> Option<ParticipantKind> {
        match self {
            CloseError::Failed { kind, .. }
            | CloseError::TimedOut { kind, .. }
            | CloseError::Panicked { kind, .. } => Some(*kind),
            CloseError::CleanupFailed { .. } => Some(ParticipantKind::Cleanup),
            CloseError::PhaseTimeout { .. } | CloseError::Interrupted { .. } => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CloseError::TimedOut { .. } | CloseError::PhaseTimeout { .. })
    }
}

/// Composite error returned by a shutdown that recorded at least one failure.
#[derive(Debug, Clone, Error)]
#[error("shutdown completed with {} errors: [{}]", .failures.len(), render(.failures))]
pub struct ShutdownError {
    failures: Vec<CloseError>,
}

fn render(failures: &[CloseError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ShutdownError {
    pub(crate) fn new(failures: Vec<CloseError>) -> Self {
        Self { failures }
    }

    pub(crate) fn interrupted(message: impl Into<String>) -> Self {
        Self::new(vec![CloseError::Interrupted {
            message: message.into(),
        }])
    }

    /// Individual failures, in the order they were recorded.
    pub fn failures(&self) -> &[CloseError] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_failures(self) -> Vec<CloseError> {
        self.failures
    }
}

/// Lock-protected list that concurrent teardown tasks record failures into.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    errors: Mutex<Vec<CloseError>>,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CloseError>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, error: CloseError) {
        self.lock().push(error);
    }

    /// Record the error side of `result`; `Ok` is ignored.
    pub fn record_result(&self, result: Result<(), CloseError>) {
        if let Err(error) = result {
            self.record(error);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drain the recorded errors into a composite error, logging each one.
    ///
    /// Returns `None` when nothing was recorded.
    pub fn flatten(&self) -> Option<ShutdownError> {
        let errors = std::mem::take(&mut *self.lock());
        if errors.is_empty() {
            return None;
        }
        for error in &errors {
            tracing::error!(error = %error, "Shutdown error");
        }
        Some(ShutdownError::new(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_empty_is_none() {
        let aggregator = ErrorAggregator::new();
        aggregator.record_result(Ok(()));
        assert!(aggregator.is_empty());
        assert!(aggregator.flatten().is_none());
    }

    #[test]
    fn composite_message_enumerates_causes() {
        let aggregator = ErrorAggregator::new();
        aggregator.record(CloseError::failed(
            ParticipantKind::Server,
            "api",
            "bind reset".into(),
        ));
        aggregator.record(CloseError::CleanupFailed {
            index: 2,
            source: Arc::new(std::io::Error::other("flush failed")),
        });

        let composite = aggregator.flatten().expect("two errors recorded");
        assert_eq!(composite.len(), 2);
        let message = composite.to_string();
        assert!(message.starts_with("shutdown completed with 2 errors"));
        assert!(message.contains("server `api` close error: bind reset"));
        assert!(message.contains("cleanup callback #2 failed: flush failed"));

        // flatten drains
        assert!(aggregator.is_empty());
    }

    #[test]
    fn phase_timeout_names_its_budget() {
        let err = CloseError::PhaseTimeout {
            budget: Duration::from_millis(50),
            abandoned: 2,
        };
        assert_eq!(
            err.to_string(),
            "grace period exceeded: 2 servers and listeners still closing after 50ms"
        );
        assert!(err.is_timeout());
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let aggregator = Arc::new(ErrorAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let aggregator = aggregator.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        aggregator.record(CloseError::TimedOut {
                            kind: ParticipantKind::Listener,
                            name: format!("l-{worker}-{i}"),
                            cause: CancelCause::DeadlineExceeded,
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(aggregator.len(), 400);
        assert_eq!(aggregator.flatten().unwrap().len(), 400);
    }
}
