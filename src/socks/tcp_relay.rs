//! TCP relay for established sessions
//!
//! Dials the destination on behalf of a handler and then copies bytes in
//! both directions until either side finishes.

use super::context::SocksContext;
use super::types::join_host_port;
use crate::error::SocksError;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Direction of a relay copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayDirection {
    /// Bytes read from the client and written to the destination
    ClientToTarget,
    /// Bytes read from the destination and written to the client
    TargetToClient,
}

impl fmt::Display for RelayDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayDirection::ClientToTarget => write!(f, "client to target"),
            RelayDirection::TargetToClient => write!(f, "target to client"),
        }
    }
}

/// Connect to `host:port` through the context's dialer
///
/// The dial is bounded by the context's connect timeout. An expired timeout
/// is reported as a [`SocksError::DialFailure`] of kind `TimedOut`.
pub async fn connect_target(
    ctx: &SocksContext,
    host: &str,
    port: u16,
) -> Result<TcpStream, SocksError> {
    let target = join_host_port(host, port);
    debug!("Connecting to target: {}", target);

    let timeout = ctx.connect_timeout();
    match tokio::time::timeout(timeout, ctx.dialer().dial(host, port)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(SocksError::DialFailure { target, source }),
        Err(_) => Err(SocksError::DialFailure {
            target,
            source: io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {:?}", timeout),
            ),
        }),
    }
}

/// Relay data bidirectionally between the client and the destination
///
/// Both copies run concurrently. The first one to finish decides the
/// result: EOF is success, an I/O error becomes
/// [`SocksError::RelayFailure`]. The other copy is dropped and both write
/// halves are shut down so each peer observes the close.
pub async fn relay_tcp<A, B>(client: A, target: B) -> Result<(), SocksError>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut target_read, mut target_write) = tokio::io::split(target);

    let result = {
        let client_to_target = tokio::io::copy(&mut client_read, &mut target_write);
        let target_to_client = tokio::io::copy(&mut target_read, &mut client_write);

        tokio::select! {
            result = client_to_target => finish(RelayDirection::ClientToTarget, result),
            result = target_to_client => finish(RelayDirection::TargetToClient, result),
        }
    };

    let _ = target_write.shutdown().await;
    let _ = client_write.shutdown().await;

    result
}

fn finish(direction: RelayDirection, result: io::Result<u64>) -> Result<(), SocksError> {
    match result {
        Ok(bytes) => {
            debug!("Relay {} finished: {} bytes", direction, bytes);
            Ok(())
        }
        Err(source) => {
            debug!("Relay {} error: {}", direction, source);
            Err(SocksError::RelayFailure { direction, source })
        }
    }
}
