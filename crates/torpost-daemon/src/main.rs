//! # torpost
//!
//! Store-and-forward messaging daemon for onion-addressed peers.
//!
//! This binary provides:
//! - **Local command listener** speaking the JSON envelope protocol
//!   (send, poll, peer list, hostname, exit, file-transfer negotiation)
//! - **Per-peer in-memory mailboxes** holding undelivered messages until a
//!   client polls for them
//! - **Outbound relay** that tunnels envelopes to remote peers through the
//!   local SOCKS5 proxy (Tor)
//! - **Append-only activity log**, one file per peer

mod config;
mod connection;
mod dispatcher;
mod error;
mod upload;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use torpost_net::RelayClient;
use torpost_store::{ActivityLog, Mailbox};

use crate::config::DaemonConfig;
use crate::connection::handle_connection;
use crate::dispatcher::Dispatcher;
use crate::error::DaemonError;
use crate::upload::UploadManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,torpost_daemon=debug")),
        )
        .init();

    info!("Starting torpost daemon v{}", env!("CARGO_PKG_VERSION"));

    let config = DaemonConfig::from_env();
    info!(
        hostname = %config.hostname,
        listen = %config.listen_addr,
        socks_port = config.socks_port,
        "Loaded configuration"
    );

    // The activity log must be writable or the daemon cannot run.
    let activity = ActivityLog::open(&config.activity_log_dir)?;

    let mailbox = Mailbox::new();
    let relay = RelayClient::new(config.socks_port, config.socks_timeout);
    let uploads = UploadManager::new(&config.download_dir);

    let dispatcher = Arc::new(Dispatcher::new(
        config.hostname.clone(),
        mailbox,
        activity,
        relay,
        uploads,
    ));

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|source| DaemonError::Bind {
            addr: config.listen_addr,
            source,
        })?;
    info!(addr = %config.listen_addr, "Listening");

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    let accept_loop = async {
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => {
                    let dispatcher = Arc::clone(&dispatcher);
                    let shutdown_tx = shutdown_tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, dispatcher, shutdown_tx).await {
                            warn!(peer = %peer, error = %e, "Connection handler failed");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                }
            }
        }
    };

    // No drain of in-flight relays on either exit path.
    tokio::select! {
        _ = accept_loop => {}
        _ = shutdown_rx.recv() => {
            info!("Exit command acknowledged, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received termination signal, shutting down");
        }
    }

    Ok(())
}
