//! Version dispatcher
//!
//! Entry point for every accepted connection. Reads the version byte and
//! hands the stream to the matching protocol handler.

use super::consts::{SOCKS4_VERSION, SOCKS5_VERSION};
use super::context::SocksContext;
use super::socks4::handle_socks4a;
use super::socks5::handle_socks5;
use crate::error::SocksError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::trace;

/// Handle one client connection from the first byte to the end of relay
///
/// Unknown versions are closed without a reply since neither protocol
/// defines one before the version is known.
///
/// # Arguments
///
/// * `stream` - The accepted client stream
/// * `ctx` - Shared handler state
pub async fn handle_connection<S>(mut stream: S, ctx: &SocksContext) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let version = stream.read_u8().await.map_err(SocksError::ConnectionRead)?;
    trace!("Client SOCKS version: {}", version);

    match version {
        SOCKS4_VERSION => handle_socks4a(stream, ctx).await,
        SOCKS5_VERSION => handle_socks5(stream, ctx).await,
        other => Err(SocksError::UnsupportedVersion(other)),
    }
}
