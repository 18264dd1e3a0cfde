//! Graceful shutdown demo service.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                       graceful-shutdown                      │
//!   │                                                              │
//!   │  HTTP server ──────┐                                         │
//!   │  (axum, phase 1)   │                                         │
//!   │                    │                                         │
//!   │  Echo listener ────┼──▶  Coordinator  ◀── SIGTERM / SIGINT   │
//!   │  (tcp, phase 2)    │     (registry,                          │
//!   │                    │      phases 1-5)                        │
//!   │  Credential ───────┤                                         │
//!   │  refresh (phase 4) │                                         │
//!   │                    │                                         │
//!   │  Cleanup ──────────┘                                         │
//!   │  (phase 5)                                                   │
//!   └──────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use graceful_shutdown::config::{load_config, validate_config, ConfigError, ServiceConfig};
use graceful_shutdown::http::HttpServer;
use graceful_shutdown::lifecycle::{shutdown_on_signal, BackgroundTask, Coordinator, ShutdownConfig};
use graceful_shutdown::net::{echo::serve_echo, BoundedListener};
use graceful_shutdown::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "graceful-shutdown")]
#[command(about = "Demo service torn down by the graceful shutdown coordinator", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `shutdown.grace_period_ms`.
    #[arg(long)]
    grace_period_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(grace_period_ms) = cli.grace_period_ms {
        config.shutdown.grace_period_ms = grace_period_ms;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability);
    tracing::info!("graceful-shutdown v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        grace_period_ms = config.shutdown.grace_period_ms,
        drain_timeout_ms = config.shutdown.drain_timeout_ms,
        force_timeout_ms = config.shutdown.force_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown_config = ShutdownConfig::from(&config.shutdown)
        .on_start(|| tracing::info!("Shutdown hook: draining service"))
        .on_complete(|outcome| match outcome {
            None => tracing::info!("Shutdown hook: all participants stopped"),
            Some(err) => tracing::warn!(failures = err.len(), "Shutdown hook: completed with errors"),
        });
    let coordinator = Coordinator::new(shutdown_config);

    // Phase 1: HTTP server
    let http_listener = TcpListener::bind(&config.http.bind_address).await?;
    let server = HttpServer::new().start(http_listener)?;
    coordinator.register_server(server);

    // Phase 2: raw TCP listener
    let listener = BoundedListener::bind(&config.listener).await?;
    coordinator.register_listener(listener.closer());
    tokio::spawn(async move {
        if let Err(e) = serve_echo(listener).await {
            tracing::error!(error = %e, "Echo listener failed");
        }
    });

    // Phase 4: credential refresh loop
    let refresh_interval = Duration::from_millis(config.identity.refresh_interval_ms);
    let identity = BackgroundTask::spawn("credential-refresh", move |token| async move {
        let mut ticker = tokio::time::interval(refresh_interval);
        let mut rotations: u64 = 0;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    rotations += 1;
                    tracing::debug!(rotations, "Credentials refreshed");
                }
            }
        }
        tracing::info!(rotations, "Credential refresh stopped");
    });
    coordinator.register_identity_provider(identity);

    // Phase 5
    coordinator.register_cleanup(|| {
        tracing::info!("Releasing process resources");
        Ok(())
    });

    if config.signals.enabled {
        let overall_timeout = Duration::from_millis(config.signals.overall_timeout_ms);
        shutdown_on_signal(&coordinator, overall_timeout).await?;
    } else {
        tracing::warn!("Signal handling disabled, waiting for an external shutdown");
        coordinator.wait().await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
