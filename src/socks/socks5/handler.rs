//! SOCKS5 CONNECT handler
//!
//! Flow for one client, after the dispatcher consumed the version byte:
//!
//! 1. Method negotiation and verification
//! 2. Request parsing
//! 3. Dial the destination
//! 4. Reply with the local bind address
//! 5. Relay until either side finishes

use super::parser::Socks5RequestHeader;
use super::reply::{rejection, Socks5Reply};
use crate::error::SocksError;
use crate::socks::auth::authenticate;
use crate::socks::consts::*;
use crate::socks::context::SocksContext;
use crate::socks::send_frame;
use crate::socks::tcp_relay::{connect_target, relay_tcp};
use crate::socks::types::{join_host_port, SocksCommand};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

/// Serve one SOCKS5 client whose version byte was already read
pub async fn handle_socks5<S>(mut stream: S, ctx: &SocksContext) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let method = authenticate(&mut stream, ctx.auth_methods()).await?;
    debug!("Authentication completed with method: {}", method.name());

    let header = Socks5RequestHeader::read_from(&mut stream).await?;

    let request = match header.read_rest(&mut stream).await {
        Ok(request) => request,
        Err(e) => return Err(reject(&mut stream, SOCKS5_REPLY_GENERAL_FAILURE, e).await),
    };

    if request.command != SocksCommand::Connect {
        let err = SocksError::UnsupportedCommand(request.command);
        return Err(reject(&mut stream, SOCKS5_REPLY_COMMAND_NOT_SUPPORTED, err).await);
    }

    let target = match connect_target(ctx, &request.destination_host, request.destination_port).await
    {
        Ok(target) => target,
        Err(e) => return Err(reject(&mut stream, SOCKS5_REPLY_GENERAL_FAILURE, e).await),
    };

    let reply = match target
        .local_addr()
        .map_err(|e| SocksError::InvalidBindAddress(format!("no local address: {}", e)))
        .and_then(|local_addr| Socks5Reply::succeeded(local_addr).to_bytes())
    {
        Ok(reply) => reply,
        Err(e) => return Err(reject(&mut stream, SOCKS5_REPLY_GENERAL_FAILURE, e).await),
    };

    send_frame(&mut stream, &reply)
        .await
        .map_err(SocksError::ConnectionWrite)?;

    info!(
        "SOCKS5 tunnel established to {}",
        join_host_port(&request.destination_host, request.destination_port)
    );

    relay_tcp(stream, target).await
}

async fn reject<S>(stream: &mut S, code: u8, cause: SocksError) -> SocksError
where
    S: AsyncWrite + Unpin,
{
    debug!("Rejecting SOCKS5 request with code {}: {}", code, cause);
    match send_frame(stream, &rejection(code)).await {
        Ok(()) => cause,
        Err(e) => SocksError::reply_failed(cause, e),
    }
}
