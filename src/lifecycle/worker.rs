//! Cancellable background loops as shutdown participants.
//!
//! # Responsibilities
//! - Spawn a named loop with its own cancellation token
//! - Expose the loop as a [`Stoppable`]: cancel, then wait for it to return
//!
//! # Design Decisions
//! - The loop runs on an inner task so a panic is reported as a close error
//! - `close()` blocks on a oneshot; callers must be off the async workers
//!   (the coordinator always is)
//! - Closing an already-stopped task is a no-op

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::participant::{BoxError, Stoppable};

type Finished = oneshot::Receiver<Result<(), String>>;

/// Handle to a spawned background loop.
pub struct BackgroundTask {
    name: String,
    token: CancellationToken,
    finished: Mutex<Option<Finished>>,
}

impl BackgroundTask {
    /// Spawn `task` on the current runtime. The loop must return once the
    /// token it receives is cancelled.
    pub fn spawn<F, Fut>(name: impl Into<String>, task: F) -> Arc<Self>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let token = CancellationToken::new();
        let (done_tx, done_rx) = oneshot::channel();

        let inner = tokio::spawn(task(token.clone()));
        let task_name = name.clone();
        tokio::spawn(async move {
            let outcome = inner.await.map_err(|e| e.to_string());
            if let Err(e) = &outcome {
                tracing::error!(task = %task_name, error = %e, "Background task failed");
            }
            let _ = done_tx.send(outcome);
        });

        tracing::debug!(task = %name, "Background task started");
        Arc::new(Self {
            name,
            token,
            finished: Mutex::new(Some(done_rx)),
        })
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Stoppable for BackgroundTask {
    fn close(&self) -> Result<(), BoxError> {
        self.token.cancel();

        let finished = self
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(finished) = finished else {
            return Ok(());
        };

        match finished.blocking_recv() {
            Ok(Ok(())) => {
                tracing::debug!(task = %self.name, "Background task stopped");
                Ok(())
            }
            Ok(Err(message)) => Err(format!("background task `{}` failed: {message}", self.name).into()),
            Err(_) => Err(format!("background task `{}` was dropped by the runtime", self.name).into()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
