//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGTERM/SIGINT (Ctrl-C on non-unix targets)
//! - Translate the first trigger into exactly one coordinator shutdown
//! - Bound the whole teardown with an overall deadline
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The trigger is any future, so tests drive the same path without signals
//! - Handler installation failures are reported, not panicked on

use std::future::Future;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::lifecycle::context::ShutdownContext;
use crate::lifecycle::errors::ShutdownError;
use crate::lifecycle::shutdown::Coordinator;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("failed to install signal handler: {0}")]
    Install(#[source] io::Error),

    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Wait for a shutdown signal. Returns the name of the signal received.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for a shutdown signal. Returns the name of the signal received.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

/// Wait for `trigger`, then shut `coordinator` down once within `overall_timeout`.
pub async fn shutdown_on<F>(
    trigger: F,
    coordinator: &Coordinator,
    overall_timeout: Duration,
) -> Result<(), SignalError>
where
    F: Future<Output = io::Result<&'static str>>,
{
    let signal = trigger.await.map_err(SignalError::Install)?;
    tracing::info!(signal, timeout = ?overall_timeout, "Shutdown signal received");

    coordinator
        .shutdown(ShutdownContext::with_timeout(overall_timeout))
        .await?;
    Ok(())
}

/// [`shutdown_on`] driven by the process's SIGTERM/SIGINT.
pub async fn shutdown_on_signal(
    coordinator: &Coordinator,
    overall_timeout: Duration,
) -> Result<(), SignalError> {
    shutdown_on(wait_for_shutdown_signal(), coordinator, overall_timeout).await
}
