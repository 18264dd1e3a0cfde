//! Shutdown coordination for the service.
//!
//! [`Coordinator`] owns the participant registry and runs the teardown
//! sequence at most once. Every caller of [`Coordinator::shutdown`] waits on
//! the same outcome.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::schema::ShutdownSettings;
use crate::lifecycle::context::ShutdownContext;
use crate::lifecycle::errors::ShutdownError;
use crate::lifecycle::participant::{BoxError, Stoppable};
use crate::lifecycle::phases;
use crate::lifecycle::registry::{ParticipantCounts, Registry, Snapshot};
use crate::observability::metrics;

/// Default bound on stopping servers and listeners.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);
/// Default bound on waiting for servers and listeners to quiesce.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(20);
/// Default bound on closing identity providers.
pub const DEFAULT_FORCE_TIMEOUT: Duration = Duration::from_secs(45);

type StartHook = Arc<dyn Fn() + Send + Sync>;
type CompleteHook = Arc<dyn Fn(Option<&ShutdownError>) + Send + Sync>;

/// Shutdown timing and observer hooks.
#[derive(Clone)]
pub struct ShutdownConfig {
    /// Bound on each server and listener close.
    pub grace_period: Duration,
    /// Bound on the joint server/listener completion barrier.
    pub drain_timeout: Duration,
    /// Bound on the identity provider phase.
    pub force_timeout: Duration,
    on_start: Option<StartHook>,
    on_complete: Option<CompleteHook>,
}

impl ShutdownConfig {
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn with_force_timeout(mut self, force_timeout: Duration) -> Self {
        self.force_timeout = force_timeout;
        self
    }

    /// Attach a hook that runs right before the first phase.
    ///
    /// Hooks chain: earlier hooks still run, in the order they were attached.
    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let chained: StartHook = match self.on_start.take() {
            Some(previous) => Arc::new(move || {
                previous();
                hook();
            }),
            None => Arc::new(hook),
        };
        self.on_start = Some(chained);
        self
    }

    /// Attach a hook that receives the final outcome after the last phase.
    ///
    /// Hooks chain like [`on_start`](Self::on_start).
    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<&ShutdownError>) + Send + Sync + 'static,
    {
        let chained: CompleteHook = match self.on_complete.take() {
            Some(previous) => Arc::new(move |outcome: Option<&ShutdownError>| {
                previous(outcome);
                hook(outcome);
            }),
            None => Arc::new(hook),
        };
        self.on_complete = Some(chained);
        self
    }

    fn notify_start(&self) {
        if let Some(hook) = &self.on_start {
            hook();
        }
    }

    fn notify_complete(&self, outcome: Option<&ShutdownError>) {
        if let Some(hook) = &self.on_complete {
            hook(outcome);
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            force_timeout: DEFAULT_FORCE_TIMEOUT,
            on_start: None,
            on_complete: None,
        }
    }
}

impl From<&ShutdownSettings> for ShutdownConfig {
    fn from(settings: &ShutdownSettings) -> Self {
        Self::default()
            .with_grace_period(Duration::from_millis(settings.grace_period_ms))
            .with_drain_timeout(Duration::from_millis(settings.drain_timeout_ms))
            .with_force_timeout(Duration::from_millis(settings.force_timeout_ms))
    }
}

impl fmt::Debug for ShutdownConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownConfig")
            .field("grace_period", &self.grace_period)
            .field("drain_timeout", &self.drain_timeout)
            .field("force_timeout", &self.force_timeout)
            .field("on_start", &self.on_start.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

type Outcome = Option<Result<(), ShutdownError>>;

struct Inner {
    config: ShutdownConfig,
    registry: Registry,
    started: AtomicBool,
    outcome: watch::Sender<Outcome>,
}

/// Coordinator for graceful shutdown.
///
/// Cloning is cheap; clones share the same registry and outcome, so a signal
/// handler and an explicit caller can both hold one.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn new(config: ShutdownConfig) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                config,
                registry: Registry::new(),
                started: AtomicBool::new(false),
                outcome,
            }),
        }
    }

    pub fn config(&self) -> &ShutdownConfig {
        &self.inner.config
    }

    /// Register a server. Returns `false` once shutdown has begun.
    pub fn register_server(&self, server: Arc<dyn Stoppable>) -> bool {
        self.inner.registry.register_server(server)
    }

    /// Register a listener. Returns `false` once shutdown has begun.
    pub fn register_listener(&self, listener: Arc<dyn Stoppable>) -> bool {
        self.inner.registry.register_listener(listener)
    }

    /// Register an outbound client. Returns `false` once shutdown has begun.
    pub fn register_client(&self, client: Arc<dyn Stoppable>) -> bool {
        self.inner.registry.register_client(client)
    }

    /// Register an identity provider. Returns `false` once shutdown has begun.
    pub fn register_identity_provider(&self, provider: Arc<dyn Stoppable>) -> bool {
        self.inner.registry.register_identity_provider(provider)
    }

    /// Register a cleanup callback. Callbacks run sequentially in registration
    /// order. Returns `false` once shutdown has begun.
    pub fn register_cleanup<F>(&self, cleanup: F) -> bool
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        self.inner.registry.register_cleanup(Box::new(cleanup))
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.registry.is_frozen()
    }

    pub fn is_complete(&self) -> bool {
        self.inner.outcome.borrow().is_some()
    }

    /// Participants registered and not yet handed to a shutdown.
    pub fn pending(&self) -> ParticipantCounts {
        self.inner.registry.pending()
    }

    /// Tear down every registered participant.
    ///
    /// Only the first call runs the sequence; it runs on its own task, so
    /// dropping the returned future does not interrupt it. Every call resolves
    /// with the result of that single run.
    pub async fn shutdown(&self, ctx: ShutdownContext) -> Result<(), ShutdownError> {
        if !self.inner.started.swap(true, Ordering::AcqRel) {
            let snapshot = self.inner.registry.freeze();
            let inner = Arc::clone(&self.inner);
            tokio::spawn(inner.execute(ctx, snapshot));
        } else {
            tracing::debug!("Shutdown already in progress, waiting for it to finish");
        }
        self.wait().await
    }

    /// Wait for a shutdown started elsewhere to finish.
    pub async fn wait(&self) -> Result<(), ShutdownError> {
        let mut outcome = self.inner.outcome.subscribe();
        let finished = outcome
            .wait_for(Option::is_some)
            .await
            .map(|finished| finished.clone());
        match finished {
            Ok(Some(result)) => result,
            Ok(None) | Err(_) => Err(ShutdownError::interrupted(
                "coordinator dropped before shutdown finished",
            )),
        }
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.inner.config)
            .field("shutting_down", &self.is_shutting_down())
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl Inner {
    async fn execute(self: Arc<Self>, ctx: ShutdownContext, snapshot: Snapshot) {
        let inner = Arc::clone(&self);
        let sequence = tokio::spawn(async move { inner.run_sequence(ctx, snapshot).await });

        let outcome = match sequence.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                tracing::error!(error = %join_error, "Shutdown sequence aborted");
                Err(ShutdownError::interrupted(join_error.to_string()))
            }
        };
        metrics::record_shutdown(outcome.is_ok());
        self.outcome.send_replace(Some(outcome));
    }

    async fn run_sequence(&self, ctx: ShutdownContext, snapshot: Snapshot) -> Result<(), ShutdownError> {
        let span = tracing::info_span!("shutdown", id = %Uuid::new_v4());
        async move {
            let counts = snapshot.counts();
            self.config.notify_start();
            tracing::info!(
                grace_period = ?self.config.grace_period,
                drain_timeout = ?self.config.drain_timeout,
                force_timeout = ?self.config.force_timeout,
                participants = counts.total(),
                "Starting graceful shutdown"
            );

            let outcome = phases::run(&self.config, &ctx, snapshot).await;
            self.config.notify_complete(outcome.as_ref().err());
            outcome
        }
        .instrument(span)
        .await
    }
}
