use thiserror::Error;

use torpost_shared::EnvelopeError;
use torpost_store::StoreError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Cannot bind listening socket on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Upload port allocation failed: {0}")]
    UploadPort(std::io::Error),
}
