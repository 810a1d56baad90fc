// Outbound relay through the local SOCKS5 proxy (Tor).

pub mod relay;
pub mod socks;

pub use relay::{Relay, RelayClient};
pub use socks::connect_via_proxy;
