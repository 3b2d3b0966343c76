//! Outbound TCP connections

use crate::resolver::{Resolver, SystemResolver};
use async_trait::async_trait;
use std::fmt::Debug;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::debug;

/// Opens TCP connections to destinations on behalf of clients
#[async_trait]
pub trait Dialer: Send + Sync + Debug {
    /// Connect to `host:port`, where `host` is an IP literal or a name
    async fn dial(&self, host: &str, port: u16) -> io::Result<TcpStream>;
}

/// Dials directly, resolving names through a [`Resolver`]
#[derive(Debug, Clone)]
pub struct DirectDialer {
    resolver: Arc<dyn Resolver>,
}

impl DirectDialer {
    /// Create a dialer that resolves names with `resolver`
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// Create a dialer using the system resolver
    pub fn system() -> Self {
        Self::new(Arc::new(SystemResolver))
    }

    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let literal = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>();
        match literal {
            Ok(ip) => Ok(vec![ip]),
            Err(_) => self.resolver.resolve(host).await,
        }
    }
}

impl Default for DirectDialer {
    fn default() -> Self {
        Self::system()
    }
}

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let addrs = self.resolve(host).await?;

        let mut last_err = None;
        for ip in addrs {
            let addr = SocketAddr::new(ip, port);
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("Failed to connect to {}: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses found for {}", host),
            )
        }))
    }
}
