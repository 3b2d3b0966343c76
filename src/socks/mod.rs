//! SOCKS4a and SOCKS5 protocol handling
//!
//! [`handle_connection`] is the per-connection entry point. It reads the
//! version byte and drives the matching protocol from request parsing to
//! the end of the relay.

pub mod auth;
pub mod consts;
mod context;
mod handler;
pub mod socks4;
pub mod socks5;
mod tcp_relay;
mod types;

pub use auth::{AuthMethod, AuthStream, NoAuth, PasswordAuth};
pub use context::SocksContext;
pub use handler::handle_connection;
pub use tcp_relay::{connect_target, relay_tcp, RelayDirection};
pub use types::{bind_address, join_host_port, AddressType, SocksCommand};

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Write a complete frame and flush it
pub(crate) async fn send_frame<S>(stream: &mut S, frame: &[u8]) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    stream.write_all(frame).await?;
    stream.flush().await
}
