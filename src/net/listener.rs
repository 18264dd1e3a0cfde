//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Stop accepting once its closer has been invoked

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::ListenerConfig;
use crate::lifecycle::participant::{BoxError, Stoppable};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
    /// The listener was closed.
    #[error("Listener closed")]
    Closed,
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
pub struct BoundedListener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
    /// Cancelled when the listener is closed.
    shutdown: CancellationToken,
}

impl BoundedListener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        Ok(Self::from_listener(listener, config.max_connections))
    }

    /// Wrap an already-bound listener.
    pub fn from_listener(listener: TcpListener, max_connections: usize) -> Self {
        if let Ok(local_addr) = listener.local_addr() {
            tracing::info!(
                address = %local_addr,
                max_connections,
                "Listener bound"
            );
        }

        Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            shutdown: CancellationToken::new(),
        }
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached.
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    /// Returns [`ListenerError::Closed`] once the listener has been closed,
    /// including while waiting.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(ListenerError::Closed),
            permit = self.connection_limit.clone().acquire_owned() => {
                permit.map_err(|_| ListenerError::Closed)?
            }
        };

        // Then accept the connection
        let (stream, addr) = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(ListenerError::Closed),
            accepted = self.inner.accept() => accepted.map_err(ListenerError::Accept)?,
        };

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Handle that closes this listener during shutdown.
    pub fn closer(&self) -> Arc<ListenerCloser> {
        let name = match self.inner.local_addr() {
            Ok(addr) => format!("tcp://{addr}"),
            Err(_) => "tcp".to_string(),
        };
        Arc::new(ListenerCloser {
            name,
            shutdown: self.shutdown.clone(),
            connection_limit: self.connection_limit.clone(),
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Closes a [`BoundedListener`]; registered with the coordinator as a listener.
///
/// Closing wakes any pending `accept()` and makes every later call fail with
/// [`ListenerError::Closed`]. Connections already accepted keep their permits.
#[derive(Debug)]
pub struct ListenerCloser {
    name: String,
    shutdown: CancellationToken,
    connection_limit: Arc<Semaphore>,
}

impl Stoppable for ListenerCloser {
    fn close(&self) -> Result<(), BoxError> {
        if !self.shutdown.is_cancelled() {
            tracing::info!(listener = %self.name, "Listener closing");
        }
        self.shutdown.cancel();
        self.connection_limit.close();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This ensures backpressure is maintained even if the connection handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
