//! The five ordered teardown phases.
//!
//! # Data Flow
//! ```text
//! Snapshot
//!     → phase 1+2: servers ∥ listeners   (grace-bounded closes, drain-bounded barrier)
//!     → phase 3:   clients               (concurrent, unbounded)
//!     → phase 4:   identity providers    (force-bounded closes and barrier)
//!     → phase 5:   cleanup callbacks     (sequential, unbounded)
//!     → ErrorAggregator::flatten
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::lifecycle::context::{CancelCause, ShutdownContext};
use crate::lifecycle::errors::{CloseError, ErrorAggregator, ShutdownError};
use crate::lifecycle::participant::{CleanupFn, ParticipantKind, Stoppable};
use crate::lifecycle::registry::Snapshot;
use crate::lifecycle::shutdown::ShutdownConfig;
use crate::observability::metrics;
use crate::resilience::timeouts::{bounded_close, unbounded_close};

/// Teardown phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    StopServers,
    CloseListeners,
    CloseClients,
    CloseIdentityProviders,
    RunCleanup,
}

impl Phase {
    pub fn number(&self) -> u8 {
        match self {
            Phase::StopServers => 1,
            Phase::CloseListeners => 2,
            Phase::CloseClients => 3,
            Phase::CloseIdentityProviders => 4,
            Phase::RunCleanup => 5,
        }
    }

    /// Metrics label. Phases 1 and 2 share one barrier and are timed together.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::StopServers | Phase::CloseListeners => "stop_servers_and_listeners",
            Phase::CloseClients => "close_clients",
            Phase::CloseIdentityProviders => "close_identity_providers",
            Phase::RunCleanup => "run_cleanup",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::StopServers => "stopping servers",
            Phase::CloseListeners => "closing listeners",
            Phase::CloseClients => "closing clients and connections",
            Phase::CloseIdentityProviders => "closing identity providers",
            Phase::RunCleanup => "running cleanup callbacks",
        };
        write!(f, "Phase {}: {}", self.number(), label)
    }
}

/// Run every phase against `snapshot` and return the aggregated outcome.
pub(crate) async fn run(
    config: &ShutdownConfig,
    ctx: &ShutdownContext,
    snapshot: Snapshot,
) -> Result<(), ShutdownError> {
    let errors = Arc::new(ErrorAggregator::new());
    let Snapshot {
        servers,
        listeners,
        clients,
        identity_providers,
        cleanups,
    } = snapshot;

    stop_servers_and_listeners(config, ctx, servers, listeners, &errors).await;
    close_clients(clients, &errors).await;
    close_identity_providers(config, ctx, identity_providers, &errors).await;
    run_cleanups(cleanups, &errors).await;

    match errors.flatten() {
        Some(error) => Err(error),
        None => {
            tracing::info!("Graceful shutdown completed successfully");
            Ok(())
        }
    }
}

async fn stop_servers_and_listeners(
    config: &ShutdownConfig,
    ctx: &ShutdownContext,
    servers: Vec<Arc<dyn Stoppable>>,
    listeners: Vec<Arc<dyn Stoppable>>,
    errors: &Arc<ErrorAggregator>,
) {
    let started = Instant::now();
    let grace = ctx.child_with_timeout(config.grace_period);
    let drain = ctx.child_with_timeout(config.drain_timeout);
    let mut tasks = JoinSet::new();

    tracing::info!(count = servers.len(), "{}", Phase::StopServers);
    for server in servers {
        spawn_close(&mut tasks, Some(&grace), ParticipantKind::Server, server, errors);
    }

    tracing::info!(count = listeners.len(), "{}", Phase::CloseListeners);
    for listener in listeners {
        spawn_close(&mut tasks, Some(&grace), ParticipantKind::Listener, listener, errors);
    }

    match await_barrier(&mut tasks, &grace, &drain).await {
        None => tracing::info!("Servers and listeners stopped"),
        Some(abandoned) => {
            tracing::warn!(abandoned, "Drain timeout exceeded, continuing shutdown");
            errors.record(CloseError::PhaseTimeout {
                budget: config.drain_timeout,
                abandoned,
            });
        }
    }
    metrics::record_phase(Phase::StopServers.as_str(), started);
}

async fn close_clients(clients: Vec<Arc<dyn Stoppable>>, errors: &Arc<ErrorAggregator>) {
    let started = Instant::now();
    let mut tasks = JoinSet::new();

    tracing::info!(count = clients.len(), "{}", Phase::CloseClients);
    for client in clients {
        spawn_close(&mut tasks, None, ParticipantKind::Client, client, errors);
    }
    drain_tasks(&mut tasks).await;
    metrics::record_phase(Phase::CloseClients.as_str(), started);
}

async fn close_identity_providers(
    config: &ShutdownConfig,
    ctx: &ShutdownContext,
    providers: Vec<Arc<dyn Stoppable>>,
    errors: &Arc<ErrorAggregator>,
) {
    let started = Instant::now();
    let force = ctx.child_with_timeout(config.force_timeout);
    let mut tasks = JoinSet::new();

    tracing::info!(count = providers.len(), "{}", Phase::CloseIdentityProviders);
    for provider in providers {
        spawn_close(&mut tasks, Some(&force), ParticipantKind::IdentityProvider, provider, errors);
    }

    // Every close is bounded by the force deadline, so the joint wait is too.
    // A provider past it is reported once, by its own guard.
    drain_tasks(&mut tasks).await;
    tracing::info!("Identity providers closed");
    metrics::record_phase(Phase::CloseIdentityProviders.as_str(), started);
}

async fn run_cleanups(cleanups: Vec<CleanupFn>, errors: &ErrorAggregator) {
    let started = Instant::now();

    tracing::info!(count = cleanups.len(), "{}", Phase::RunCleanup);
    for (position, cleanup) in cleanups.into_iter().enumerate() {
        let index = position + 1;
        match tokio::task::spawn_blocking(cleanup).await {
            Ok(Ok(())) => tracing::debug!(index, "Cleanup callback finished"),
            Ok(Err(source)) => {
                tracing::warn!(index, error = %source, "Cleanup callback failed");
                metrics::record_close_failure(ParticipantKind::Cleanup);
                errors.record(CloseError::CleanupFailed {
                    index,
                    source: Arc::from(source),
                });
            }
            Err(join_error) => {
                tracing::warn!(index, error = %join_error, "Cleanup callback panicked");
                metrics::record_close_failure(ParticipantKind::Cleanup);
                errors.record(CloseError::Panicked {
                    kind: ParticipantKind::Cleanup,
                    name: format!("#{index}"),
                    message: join_error.to_string(),
                });
            }
        }
    }
    metrics::record_phase(Phase::RunCleanup.as_str(), started);
}

/// Spawn one teardown task. `bound` of `None` waits for the close however
/// long it takes.
fn spawn_close(
    tasks: &mut JoinSet<()>,
    bound: Option<&ShutdownContext>,
    kind: ParticipantKind,
    participant: Arc<dyn Stoppable>,
    errors: &Arc<ErrorAggregator>,
) {
    let bound = bound.cloned();
    let errors = Arc::clone(errors);
    tasks.spawn(async move {
        let result = match &bound {
            Some(ctx) => bounded_close(ctx, kind, participant).await,
            None => unbounded_close(kind, participant).await,
        };
        if let Err(error) = &result {
            tracing::warn!(kind = %kind, error = %error, "Participant close failed");
            metrics::record_close_failure(kind);
        }
        errors.record_result(result);
    });
}

/// Wait for every task in `tasks`, each bounded by `guard`, or until
/// `window` expires.
///
/// Returns the number of closes abandoned at the window's deadline, or `None`
/// when every close reported on its own. Abandoned tasks are aborted and
/// reaped before returning, so none records into the aggregator afterwards.
async fn await_barrier(
    tasks: &mut JoinSet<()>,
    guard: &ShutdownContext,
    window: &ShutdownContext,
) -> Option<usize> {
    if tasks.is_empty() {
        return None;
    }

    // A window ending no earlier than the guards can never cut a close short.
    let guards_first = match (guard.deadline(), window.deadline()) {
        (Some(guard), Some(window)) => guard <= window,
        _ => false,
    };
    if guards_first {
        drain_tasks(tasks).await;
        return None;
    }

    let cause = tokio::select! {
        biased;
        _ = drain_tasks(tasks) => return None,
        cause = window.done() => cause,
    };

    if cause == CancelCause::Cancelled {
        // Cancellation reaches the guards too; they report promptly.
        drain_tasks(tasks).await;
        return None;
    }

    tasks.abort_all();
    let mut abandoned = 0;
    while let Some(joined) = tasks.join_next().await {
        if matches!(&joined, Err(join_error) if join_error.is_cancelled()) {
            abandoned += 1;
        }
    }
    tracing::debug!(abandoned, "Abandoned teardown tasks past the barrier");
    (abandoned > 0).then_some(abandoned)
}

async fn drain_tasks(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(join_error) = joined {
            if join_error.is_panic() {
                tracing::error!(error = %join_error, "Teardown task panicked");
            }
        }
    }
}
