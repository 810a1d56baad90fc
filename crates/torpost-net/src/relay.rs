//! Outbound relay: one tunneled connection per envelope.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use torpost_shared::constants::DEFAULT_SOCKS_TIMEOUT_SECS;
use torpost_shared::SocksError;

use crate::socks::connect_via_proxy;

/// The seam between the dispatcher and the proxy. The dispatcher is generic
/// over this so tests can substitute a scripted relay.
pub trait Relay: Send + Sync + 'static {
    /// Deliver `payload` to `dest_id:dest_port` through the proxy. A failed
    /// attempt is terminal for the request; retry policy belongs to callers.
    fn relay(
        &self,
        dest_id: &str,
        dest_port: u16,
        payload: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<(), SocksError>> + Send;
}

/// Production relay: SOCKS5 CONNECT, write, shutdown, close.
#[derive(Debug, Clone)]
pub struct RelayClient {
    proxy_port: u16,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(proxy_port: u16, timeout: Duration) -> Self {
        Self {
            proxy_port,
            timeout,
        }
    }
}

impl Default for RelayClient {
    fn default() -> Self {
        Self::new(
            torpost_shared::constants::DEFAULT_SOCKS_PORT,
            Duration::from_secs(DEFAULT_SOCKS_TIMEOUT_SECS),
        )
    }
}

impl Relay for RelayClient {
    async fn relay(
        &self,
        dest_id: &str,
        dest_port: u16,
        payload: Vec<u8>,
    ) -> Result<(), SocksError> {
        let attempt = async {
            let mut stream = connect_via_proxy(self.proxy_port, dest_id, dest_port).await?;
            stream
                .write_all(&payload)
                .await
                .map_err(|_| SocksError::GeneralFailure)?;
            stream
                .shutdown()
                .await
                .map_err(|_| SocksError::GeneralFailure)?;
            Ok(())
        };

        // One bounded window over connect + handshake + payload write. The
        // protocol itself imposes no timeout, so an expiry surfaces as the
        // catch-all explanation.
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => {
                if result.is_ok() {
                    debug!(dest = %dest_id, port = dest_port, "Relayed envelope");
                }
                result
            }
            Err(_) => Err(SocksError::Unknown),
        }
    }
}
