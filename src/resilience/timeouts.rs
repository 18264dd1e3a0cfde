//! Timeout enforcement for participant teardown.
//!
//! # Responsibilities
//! - Run a blocking `close()` concurrently with a deadline watch
//! - Report the close result or a timeout, whichever comes first
//!
//! # Design Decisions
//! - Bounded closes run on a dedicated detached thread, never on Tokio's
//!   blocking pool: the runtime joins its blocking pool on drop, so a close
//!   that never returns there would keep the process alive
//! - Unbounded closes are awaited to completion anyway, so they use the pool
//! - Timeout errors are distinct from close failures
//! - An abandoned close is detached, not joined: it may keep running

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::lifecycle::context::ShutdownContext;
use crate::lifecycle::errors::CloseError;
use crate::lifecycle::participant::{BoxError, ParticipantKind, Stoppable};

/// Result of one `close()` call; `Err` carries a panic message.
type Closed = Result<Result<(), BoxError>, String>;

/// Close `participant`, giving up when `ctx` finishes first.
pub async fn bounded_close(
    ctx: &ShutdownContext,
    kind: ParticipantKind,
    participant: Arc<dyn Stoppable>,
) -> Result<(), CloseError> {
    let name = participant.name().to_string();
    let closing = close_detached(kind, participant)
        .map_err(|e| CloseError::failed(kind, name.clone(), Box::new(e)))?;

    tokio::select! {
        closed = closing => {
            let closed = closed.unwrap_or_else(|_| Err("close thread exited without reporting".to_string()));
            close_outcome(kind, name, closed)
        }
        cause = ctx.done() => {
            tracing::warn!(kind = %kind, name = %name, cause = %cause, "Close timed out, abandoning");
            Err(CloseError::TimedOut { kind, name, cause })
        }
    }
}

/// Close `participant` and wait for it however long it takes.
pub async fn unbounded_close(
    kind: ParticipantKind,
    participant: Arc<dyn Stoppable>,
) -> Result<(), CloseError> {
    let name = participant.name().to_string();
    let closed = tokio::task::spawn_blocking(move || participant.close())
        .await
        .map_err(|join_error| join_error.to_string());
    close_outcome(kind, name, closed)
}

/// Run `close()` on its own thread and report through a oneshot.
fn close_detached(
    kind: ParticipantKind,
    participant: Arc<dyn Stoppable>,
) -> std::io::Result<oneshot::Receiver<Closed>> {
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name(format!("close-{}", kind.as_str()))
        .spawn(move || {
            let closed = panic::catch_unwind(AssertUnwindSafe(|| participant.close()))
                .map_err(panic_message);
            // The receiver is gone once the close was abandoned.
            let _ = tx.send(closed);
        })?;
    Ok(rx)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

fn close_outcome(kind: ParticipantKind, name: String, closed: Closed) -> Result<(), CloseError> {
    match closed {
        Ok(Ok(())) => {
            tracing::debug!(kind = %kind, name = %name, "Closed");
            Ok(())
        }
        Ok(Err(source)) => Err(CloseError::failed(kind, name, source)),
        Err(message) => Err(CloseError::Panicked { kind, name, message }),
    }
}
