//! Per-connection entry point.
//!
//! Reads the buffered request off the socket, decodes it, runs the
//! dispatcher, and writes the reply back. A request that fails to decode is
//! logged and dropped; the connection gets no reply. An activity-log failure
//! is fatal for the whole process.

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use torpost_net::Relay;
use torpost_shared::constants::MAX_REQUEST_SIZE;
use torpost_shared::Envelope;
use torpost_store::StoreError;

use crate::dispatcher::Dispatcher;
use crate::error::DaemonError;

/// Handle one accepted connection to completion.
pub async fn handle_connection<R: Relay>(
    mut socket: TcpStream,
    dispatcher: std::sync::Arc<Dispatcher<R>>,
    shutdown_tx: mpsc::Sender<()>,
) -> Result<(), DaemonError> {
    let mut buf = BytesMut::with_capacity(4096);

    // Read until the peer half-closes or the buffer holds a complete
    // envelope. Local clients send one request and shut down their write
    // side; remote relays close outright.
    loop {
        if buf.len() >= MAX_REQUEST_SIZE {
            warn!(len = buf.len(), "Request too large, dropping connection");
            return Ok(());
        }
        let n = socket.read_buf(&mut buf).await?;
        if n == 0 {
            break;
        }
        if serde_json::from_slice::<serde_json::Value>(&buf).is_ok() {
            break;
        }
    }

    if buf.is_empty() {
        return Ok(());
    }

    let envelope = match Envelope::from_json(&buf) {
        Ok(envelope) => envelope,
        Err(e) => {
            // Malformed input never crashes the dispatcher and never gets a
            // reply; it is only recorded.
            warn!(
                error = %e,
                raw = %String::from_utf8_lossy(&buf),
                "Dropping undecodable request"
            );
            return Ok(());
        }
    };

    debug!(cmd = %envelope.cmd, from = %envelope.id, "Dispatching request");

    let outcome = match dispatcher.handle(envelope).await {
        Ok(outcome) => outcome,
        Err(DaemonError::Store(e @ StoreError::ActivityLog { .. })) => {
            // The daemon cannot usefully continue without its log.
            error!(error = %e, "Activity log failure, terminating");
            std::process::exit(1);
        }
        Err(e) => return Err(e),
    };

    if let Some(reply) = outcome.reply {
        let bytes = reply.to_json()?;
        socket.write_all(&bytes).await?;
        socket.flush().await?;
    }

    if outcome.shutdown {
        let _ = shutdown_tx.send(()).await;
    }

    Ok(())
}
