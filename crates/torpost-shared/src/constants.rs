/// Default port of the local SOCKS5 proxy (the Tor client).
pub const DEFAULT_SOCKS_PORT: u16 = 9250;

/// Default address the daemon listens on for local clients and inbound peers.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:9898";

/// Well-known port carried in the reply to a file-allocation request.
pub const FILE_ALLOC_PORT: u16 = 80;

/// Maximum length of a peer id in bytes (an onion hostname fits in 29).
pub const MAX_PEER_ID_LEN: usize = 29;

/// Maximum size of a single inbound request in bytes.
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Default bound on the whole SOCKS negotiate-and-send sequence, in seconds.
pub const DEFAULT_SOCKS_TIMEOUT_SECS: u64 = 60;

/// Date format stamped on stored messages and activity log lines.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
