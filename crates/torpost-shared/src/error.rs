use thiserror::Error;

/// Errors decoding or validating a wire envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Empty peer id")]
    EmptyPeerId,

    #[error("Peer id too long: {0} bytes")]
    PeerIdTooLong(usize),

    #[error("Reply-only command used as input: {0}")]
    ReplyOnlyCommand(&'static str),
}

/// Outcome of a failed relay attempt through the SOCKS5 proxy.
///
/// The display strings are returned verbatim to the client in the `msg`
/// field of an `ERR` envelope. Codes 1 through 8 are the RFC 1928 reply
/// codes; the handshake case covers the proxy itself being unreachable,
/// which almost always means Tor is not running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocksError {
    #[error("general SOCKS server failure")]
    GeneralFailure,

    #[error("connection not allowed by ruleset")]
    RulesetDenied,

    #[error("Network unreachable")]
    NetworkUnreachable,

    #[error("Host unreachable")]
    HostUnreachable,

    #[error("Connection refused")]
    ConnectionRefused,

    #[error("TTL expired")]
    TtlExpired,

    #[error("Command not supported")]
    CommandNotSupported,

    #[error("Address type not supported")]
    AddressTypeNotSupported,

    #[error("Could not send message. Is TOR running?")]
    ProxyHandshake,

    #[error("TOR couldn't send the message")]
    Unknown,
}

impl SocksError {
    /// Map an RFC 1928 reply code to its error. Code 0 is success and must
    /// not reach this function; anything outside the table is `Unknown`.
    pub fn from_reply_code(code: u8) -> Self {
        match code {
            1 => SocksError::GeneralFailure,
            2 => SocksError::RulesetDenied,
            3 => SocksError::NetworkUnreachable,
            4 => SocksError::HostUnreachable,
            5 => SocksError::ConnectionRefused,
            6 => SocksError::TtlExpired,
            7 => SocksError::CommandNotSupported,
            8 => SocksError::AddressTypeNotSupported,
            _ => SocksError::Unknown,
        }
    }
}
