//! Upload-port negotiation for incoming file transfers.
//!
//! When a peer announces it is ready to send a file (`FILEUP`), the daemon
//! allocates an ephemeral local port, parks a task that accepts exactly one
//! connection on it, and hands the port number back as the reply payload.
//! Whatever arrives on that connection is drained to a file in the download
//! directory; chunking and integrity checks are the transfer tool's problem,
//! not ours.

use std::path::PathBuf;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::DaemonError;

/// How long the parked listener waits for the uploader before giving up.
const UPLOAD_ACCEPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Allocates one-shot upload listeners.
#[derive(Debug, Clone)]
pub struct UploadManager {
    download_dir: PathBuf,
}

impl UploadManager {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }

    /// Bind an ephemeral listener and return its port. The receive task is
    /// detached on purpose: the negotiation reply must not wait for the
    /// uploader to show up.
    pub async fn allocate_port(&self) -> Result<u16, DaemonError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(DaemonError::UploadPort)?;
        let port = listener.local_addr().map_err(DaemonError::UploadPort)?.port();

        let dir = self.download_dir.clone();
        tokio::spawn(async move {
            if let Err(e) = receive_one(listener, dir, port).await {
                warn!(port, error = %e, "Upload receive failed");
            }
        });

        debug!(port, "Allocated upload port");
        Ok(port)
    }
}

/// Accept one connection and drain it to `<dir>/upload-<port>-<timestamp>`.
async fn receive_one(listener: TcpListener, dir: PathBuf, port: u16) -> std::io::Result<()> {
    let accepted = tokio::time::timeout(UPLOAD_ACCEPT_TIMEOUT, listener.accept()).await;
    let (mut stream, peer) = match accepted {
        Ok(result) => result?,
        Err(_) => {
            debug!(port, "No uploader connected before timeout");
            return Ok(());
        }
    };

    tokio::fs::create_dir_all(&dir).await?;
    let name = format!("upload-{port}-{}", chrono::Utc::now().timestamp());
    let path = dir.join(name);
    let mut file = tokio::fs::File::create(&path).await?;

    let bytes = tokio::io::copy(&mut stream, &mut file).await?;

    info!(from = %peer, path = %path.display(), bytes, "Upload received");
    Ok(())
}
