//! HTTP server setup and shutdown handle.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing)
//! - Serve on a bound listener from a background task
//! - Expose the running server as a shutdown participant
//!
//! # Design Decisions
//! - Graceful shutdown is triggered by a oneshot, not by OS signals; signals
//!   go through the coordinator
//! - `ServerHandle::close()` blocks until the serve loop returns, so the
//!   coordinator's grace period bounds in-flight request draining
//! - Dropping the handle also stops the server

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

use crate::lifecycle::participant::{BoxError, Stoppable};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub started_at: Instant,
}

/// HTTP server.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new() -> Self {
        let state = AppState {
            started_at: Instant::now(),
        };
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/slow", get(slow_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Start serving on `listener` from a background task.
    pub fn start(self, listener: TcpListener) -> Result<Arc<ServerHandle>, std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            let result = axum::serve(listener, self.router)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                    tracing::info!(address = %addr, "HTTP server draining");
                })
                .await;

            match &result {
                Ok(()) => tracing::info!(address = %addr, "HTTP server stopped"),
                Err(e) => tracing::error!(address = %addr, error = %e, "HTTP server failed"),
            }
            let _ = done_tx.send(result.map_err(|e| e.to_string()));
        });

        Ok(Arc::new(ServerHandle {
            name: format!("http://{addr}"),
            local_addr: addr,
            stop: Mutex::new(Some(stop_tx)),
            finished: Mutex::new(Some(done_rx)),
        }))
    }
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running [`HttpServer`]; registered with the coordinator as a server.
pub struct ServerHandle {
    name: String,
    local_addr: SocketAddr,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    finished: Mutex<Option<oneshot::Receiver<Result<(), String>>>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Stoppable for ServerHandle {
    /// Stop accepting, let in-flight requests finish, then return.
    fn close(&self) -> Result<(), BoxError> {
        if let Some(stop) = self.stop.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = stop.send(());
        }

        let finished = self
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(finished) = finished else {
            return Ok(());
        };

        match finished.blocking_recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(format!("serve loop failed: {message}").into()),
            Err(_) => Err("serve loop dropped before reporting".into()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Deserialize)]
struct SlowParams {
    ms: Option<u64>,
}

/// Sleeps for `ms` milliseconds before answering. Used to observe draining.
async fn slow_handler(Query(params): Query<SlowParams>) -> impl IntoResponse {
    let ms = params.ms.unwrap_or(100);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    format!("done after {ms}ms")
}
