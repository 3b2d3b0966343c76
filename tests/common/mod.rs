//! Test utilities for socks-server
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use socks_server::resolver::Resolver;
use socks_server::server::SocksServer;
use std::io;
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// A running server and the handle that stops it
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown_tx: broadcast::Sender<bool>,
    pub handle: JoinHandle<Result<(), socks_server::ServerError>>,
}

impl TestServer {
    /// Connect a fresh client to the server
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    /// Stop the server and wait for the accept loop to return
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

/// Serve `server` on an ephemeral local port
pub async fn spawn_server(server: SocksServer) -> TestServer {
    let (listener, addr) = create_test_listener().await;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { server.serve(listener, shutdown_rx).await });

    TestServer {
        addr,
        shutdown_tx,
        handle,
    }
}

/// Destination that reports the proxy's source address, then echoes
///
/// Returns the listen address and a receiver for the peer address of the
/// first accepted connection.
pub async fn spawn_echo_destination() -> (SocketAddr, oneshot::Receiver<SocketAddr>) {
    let (listener, addr) = create_test_listener().await;
    let (peer_tx, peer_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, peer) = listener.accept().await.unwrap();
        let _ = peer_tx.send(peer);

        let mut buf = [0u8; 1024];
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if socket.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    (addr, peer_rx)
}

/// Destination that reports how its first connection ended
///
/// The receiver gets the number of bytes read before EOF.
pub async fn spawn_eof_destination() -> (SocketAddr, oneshot::Receiver<usize>) {
    let (listener, addr) = create_test_listener().await;
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let read = socket.read_to_end(&mut buf).await.unwrap_or(0);
        let _ = done_tx.send(read);
    });

    (addr, done_rx)
}

/// A port with nothing listening on it
pub async fn closed_port() -> u16 {
    let (listener, addr) = create_test_listener().await;
    drop(listener);
    addr.port()
}

/// Resolver answering every name with the same addresses
#[derive(Debug, Clone)]
pub struct StaticResolver(pub Vec<IpAddr>);

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, _host: &str) -> io::Result<Vec<IpAddr>> {
        Ok(self.0.clone())
    }
}

/// SOCKS5 no-auth handshake, asserting the server picks method 0
pub async fn socks5_no_auth(client: &mut TcpStream) {
    client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut selection = [0u8; 2];
    client.read_exact(&mut selection).await.unwrap();
    assert_eq!(selection, [0x05, 0x00]);
}

/// SOCKS5 CONNECT request to an IPv4 destination
pub fn socks5_connect_ipv4(addr: SocketAddr) -> Vec<u8> {
    let ip = match addr.ip() {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(_) => panic!("IPv4 destination expected"),
    };
    let mut request = vec![0x05, 0x01, 0x00, 0x01];
    request.extend_from_slice(&ip.octets());
    request.extend_from_slice(&addr.port().to_be_bytes());
    request
}
