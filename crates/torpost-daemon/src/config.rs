//! Daemon configuration loaded from environment variables.
//!
//! All settings have defaults so the daemon can start with zero
//! configuration for local development. The own-hostname value is injected
//! here once at startup and passed explicitly to the dispatcher and relay
//! client; nothing reads it as ambient state afterwards.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use torpost_shared::constants::{
    DEFAULT_LISTEN_ADDR, DEFAULT_SOCKS_PORT, DEFAULT_SOCKS_TIMEOUT_SECS,
};

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// This node's own onion hostname, written as the sender id on every
    /// relayed envelope.
    /// Env: `TORPOST_HOSTNAME`
    pub hostname: String,

    /// Socket address for the local listener.
    /// Env: `LISTEN_ADDR`
    /// Default: `127.0.0.1:9898`
    pub listen_addr: SocketAddr,

    /// Port of the local SOCKS5 proxy.
    /// Env: `SOCKS_PORT`
    /// Default: `9250`
    pub socks_port: u16,

    /// Bound on one whole negotiate-and-send sequence.
    /// Env: `SOCKS_TIMEOUT_SECS`
    /// Default: 60
    pub socks_timeout: Duration,

    /// Directory for the per-peer activity log files.
    /// Env: `ACTIVITY_LOG_DIR`
    /// Default: `./activity`
    pub activity_log_dir: PathBuf,

    /// Directory where negotiated file uploads land.
    /// Env: `DOWNLOAD_DIR`
    /// Default: `./downloads`
    pub download_dir: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            hostname: "7a73izkph3wutuh6.onion".to_string(),
            listen_addr: DEFAULT_LISTEN_ADDR.parse().expect("default listen addr"),
            socks_port: DEFAULT_SOCKS_PORT,
            socks_timeout: Duration::from_secs(DEFAULT_SOCKS_TIMEOUT_SECS),
            activity_log_dir: PathBuf::from("./activity"),
            download_dir: PathBuf::from("./downloads"),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(hostname) = std::env::var("TORPOST_HOSTNAME") {
            if !hostname.is_empty() {
                config.hostname = hostname;
            }
        }

        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.listen_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid LISTEN_ADDR, using default");
            }
        }

        if let Ok(port) = std::env::var("SOCKS_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                config.socks_port = parsed;
            } else {
                tracing::warn!(value = %port, "Invalid SOCKS_PORT, using default");
            }
        }

        if let Ok(secs) = std::env::var("SOCKS_TIMEOUT_SECS") {
            if let Ok(parsed) = secs.parse::<u64>() {
                config.socks_timeout = Duration::from_secs(parsed);
            } else {
                tracing::warn!(value = %secs, "Invalid SOCKS_TIMEOUT_SECS, using default");
            }
        }

        if let Ok(dir) = std::env::var("ACTIVITY_LOG_DIR") {
            config.activity_log_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }

        config
    }
}
