//! SOCKS4a CONNECT handler

use super::parser::Socks4Header;
use super::reply::{rejection, Socks4Reply};
use crate::error::SocksError;
use crate::socks::consts::SOCKS4_REPLY_REJECTED;
use crate::socks::context::SocksContext;
use crate::socks::send_frame;
use crate::socks::tcp_relay::{connect_target, relay_tcp};
use crate::socks::types::{join_host_port, SocksCommand};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

/// Serve one SOCKS4/4a client whose version byte was already read
///
/// Once the 7-byte header is known, every failure is answered with reply
/// 91 before the error is returned.
pub async fn handle_socks4a<S>(mut stream: S, ctx: &SocksContext) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let header = Socks4Header::read_from(&mut stream).await?;

    let request = match header.read_rest(&mut stream).await {
        Ok(request) => request,
        Err(e) => return Err(reject(&mut stream, e).await),
    };

    if request.command != SocksCommand::Connect {
        return Err(reject(&mut stream, SocksError::UnsupportedCommand(request.command)).await);
    }

    let target = match connect_target(ctx, &request.destination_host, request.destination_port).await
    {
        Ok(target) => target,
        Err(e) => return Err(reject(&mut stream, e).await),
    };

    let local_addr = match target.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            let err = SocksError::InvalidBindAddress(format!("no local address: {}", e));
            return Err(reject(&mut stream, err).await);
        }
    };

    let reply = match Socks4Reply::granted(local_addr).to_bytes() {
        Ok(reply) => reply,
        Err(e) => return Err(reject(&mut stream, e).await),
    };

    send_frame(&mut stream, &reply)
        .await
        .map_err(SocksError::ConnectionWrite)?;

    info!(
        "SOCKS4 tunnel established to {}",
        join_host_port(&request.destination_host, request.destination_port)
    );

    relay_tcp(stream, target).await
}

async fn reject<S>(stream: &mut S, cause: SocksError) -> SocksError
where
    S: AsyncWrite + Unpin,
{
    debug!("Rejecting SOCKS4 request: {}", cause);
    match send_frame(stream, &rejection(SOCKS4_REPLY_REJECTED)).await {
        Ok(()) => cause,
        Err(e) => SocksError::reply_failed(cause, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialer::Dialer;
    use async_trait::async_trait;
    use std::io;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[derive(Debug)]
    struct RefusingDialer;

    #[async_trait]
    impl Dialer for RefusingDialer {
        async fn dial(&self, _host: &str, _port: u16) -> io::Result<TcpStream> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }

    /// Dials a fixed local address whatever the request says
    #[derive(Debug)]
    struct FixedDialer(std::net::SocketAddr);

    #[async_trait]
    impl Dialer for FixedDialer {
        async fn dial(&self, _host: &str, _port: u16) -> io::Result<TcpStream> {
            TcpStream::connect(self.0).await
        }
    }

    #[tokio::test]
    async fn test_bind_command_rejected() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[2, 0, 21, 10, 0, 0, 1, 0])
            .write(&rejection(SOCKS4_REPLY_REJECTED))
            .build();

        let ctx = SocksContext::new(Arc::new(RefusingDialer));
        let result = handle_socks4a(&mut stream, &ctx).await;
        assert!(matches!(
            result,
            Err(SocksError::UnsupportedCommand(SocksCommand::Bind))
        ));
    }

    #[tokio::test]
    async fn test_unknown_command_rejected() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[9, 0, 80, 10, 0, 0, 1, 0])
            .write(&rejection(SOCKS4_REPLY_REJECTED))
            .build();

        let ctx = SocksContext::new(Arc::new(RefusingDialer));
        let result = handle_socks4a(&mut stream, &ctx).await;
        assert!(matches!(
            result,
            Err(SocksError::UnsupportedCommand(SocksCommand::Unknown(9)))
        ));
    }

    #[tokio::test]
    async fn test_udp_associate_byte_is_unknown() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[3, 0, 53, 10, 0, 0, 1, 0])
            .write(&rejection(SOCKS4_REPLY_REJECTED))
            .build();

        let ctx = SocksContext::new(Arc::new(RefusingDialer));
        let err = handle_socks4a(&mut stream, &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            SocksError::UnsupportedCommand(SocksCommand::Unknown(3))
        ));
    }

    #[tokio::test]
    async fn test_truncated_header_gets_no_reply() {
        let mut stream = tokio_test::io::Builder::new().read(&[1, 0, 80]).build();

        let ctx = SocksContext::new(Arc::new(RefusingDialer));
        let result = handle_socks4a(&mut stream, &ctx).await;
        assert!(matches!(result, Err(SocksError::MalformedRequest(_))));
    }

    #[tokio::test]
    async fn test_truncated_user_id_rejected() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[1, 0, 80, 10, 0, 0, 1, b'b', b'o'])
            .read_error(io::Error::new(io::ErrorKind::UnexpectedEof, "client closed"))
            .write(&rejection(SOCKS4_REPLY_REJECTED))
            .build();

        let ctx = SocksContext::new(Arc::new(RefusingDialer));
        let result = handle_socks4a(&mut stream, &ctx).await;
        assert!(matches!(result, Err(SocksError::MalformedRequest(_))));
    }

    #[tokio::test]
    async fn test_dial_failure_rejected() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[1, 0, 80, 10, 0, 0, 1, 0])
            .write(&rejection(SOCKS4_REPLY_REJECTED))
            .build();

        let ctx = SocksContext::new(Arc::new(RefusingDialer));
        let result = handle_socks4a(&mut stream, &ctx).await;
        assert!(matches!(result, Err(SocksError::DialFailure { .. })));
    }

    #[tokio::test]
    async fn test_connect_and_relay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dest_addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let (mut client, server) = tokio::io::duplex(1024);
        let ctx = SocksContext::new(Arc::new(FixedDialer(dest_addr)));
        let handler = tokio::spawn(async move { handle_socks4a(server, &ctx).await });

        let mut request = vec![1u8];
        request.extend_from_slice(&dest_addr.port().to_be_bytes());
        request.extend_from_slice(&[0, 0, 0, 1]);
        request.extend_from_slice(b"user\0localhost\0");
        client.write_all(&request).await.unwrap();

        let mut reply = [0u8; 8];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[0], 0x00);
        assert_eq!(reply[1], 90);
        assert_eq!(&reply[4..], &[127, 0, 0, 1]);

        client.write_all(b"ping").await.unwrap();
        let mut echoed = [0u8; 4];
        client.read_exact(&mut echoed).await.unwrap();
        assert_eq!(&echoed, b"ping");

        drop(client);
        let _ = handler.await.unwrap();
    }
}
