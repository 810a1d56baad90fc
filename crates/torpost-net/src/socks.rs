//! SOCKS5 CONNECT client (RFC 1928).
//!
//! Dials the local proxy, negotiates no-auth, and issues a CONNECT for the
//! destination as a domain-type address. Onion hostnames must reach the proxy
//! unresolved: ATYP is always 0x03, never an IP literal.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use torpost_shared::SocksError;

const SOCKS_VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const CMD_CONNECT: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV4: u8 = 0x01;
const ATYP_IPV6: u8 = 0x04;

/// Open a tunnel to `dest_host:dest_port` through the SOCKS5 proxy listening
/// on `127.0.0.1:proxy_port`. On success the returned stream is connected to
/// the destination end-to-end.
///
/// Failure to reach the proxy or to get through the method negotiation maps
/// to [`SocksError::ProxyHandshake`]; a non-zero CONNECT reply maps through
/// the RFC 1928 code table.
pub async fn connect_via_proxy(
    proxy_port: u16,
    dest_host: &str,
    dest_port: u16,
) -> Result<TcpStream, SocksError> {
    if dest_host.len() > u8::MAX as usize {
        return Err(SocksError::AddressTypeNotSupported);
    }

    let mut stream = TcpStream::connect(("127.0.0.1", proxy_port))
        .await
        .map_err(|_| SocksError::ProxyHandshake)?;

    // Greeting: version 5, one method, no authentication.
    stream
        .write_all(&[SOCKS_VERSION, 1, METHOD_NO_AUTH])
        .await
        .map_err(|_| SocksError::ProxyHandshake)?;

    let mut method = [0u8; 2];
    stream
        .read_exact(&mut method)
        .await
        .map_err(|_| SocksError::ProxyHandshake)?;
    if method != [SOCKS_VERSION, METHOD_NO_AUTH] {
        return Err(SocksError::ProxyHandshake);
    }

    // CONNECT request, destination as a domain name.
    let mut request = Vec::with_capacity(7 + dest_host.len());
    request.extend_from_slice(&[SOCKS_VERSION, CMD_CONNECT, 0x00, ATYP_DOMAIN]);
    request.push(dest_host.len() as u8);
    request.extend_from_slice(dest_host.as_bytes());
    request.extend_from_slice(&dest_port.to_be_bytes());
    stream
        .write_all(&request)
        .await
        .map_err(|_| SocksError::GeneralFailure)?;

    // Reply: VER REP RSV ATYP BND.ADDR BND.PORT
    let mut head = [0u8; 4];
    stream
        .read_exact(&mut head)
        .await
        .map_err(|_| SocksError::GeneralFailure)?;
    if head[0] != SOCKS_VERSION {
        return Err(SocksError::GeneralFailure);
    }
    if head[1] != 0x00 {
        return Err(SocksError::from_reply_code(head[1]));
    }

    // Drain the bound address so the stream starts at the tunneled bytes.
    let bound_len = match head[3] {
        ATYP_IPV4 => 4 + 2,
        ATYP_IPV6 => 16 + 2,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream
                .read_exact(&mut len)
                .await
                .map_err(|_| SocksError::GeneralFailure)?;
            len[0] as usize + 2
        }
        _ => return Err(SocksError::AddressTypeNotSupported),
    };
    let mut bound = vec![0u8; bound_len];
    stream
        .read_exact(&mut bound)
        .await
        .map_err(|_| SocksError::GeneralFailure)?;

    debug!(dest = %dest_host, port = dest_port, "SOCKS5 tunnel established");
    Ok(stream)
}
