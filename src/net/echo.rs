//! Line-agnostic TCP echo service.
//!
//! Accepts on a [`BoundedListener`] until it is closed, echoing every byte
//! back to the peer. Each connection holds a permit for its lifetime.

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::net::listener::{BoundedListener, ConnectionPermit, ListenerError};

/// Run the accept loop. Returns `Ok(())` once the listener is closed.
pub async fn serve_echo(listener: BoundedListener) -> Result<(), ListenerError> {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr, permit)) => {
                tokio::spawn(async move {
                    if let Err(e) = echo(stream, permit).await {
                        tracing::debug!(peer_addr = %peer_addr, error = %e, "Echo connection ended with error");
                    }
                });
            }
            Err(ListenerError::Closed) => {
                tracing::info!("Echo listener stopped accepting");
                return Ok(());
            }
            Err(e) => {
                // Transient accept errors (e.g. EMFILE) must not kill the loop.
                tracing::warn!(error = %e, "Accept failed");
            }
        }
    }
}

async fn echo(mut stream: TcpStream, _permit: ConnectionPermit) -> std::io::Result<()> {
    let (mut reader, mut writer) = stream.split();
    tokio::io::copy(&mut reader, &mut writer).await?;
    writer.shutdown().await
}
