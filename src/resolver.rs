//! Host name resolution
//!
//! [`SystemResolver`] uses the operating system. [`DnsServerResolver`]
//! sends A and AAAA queries over UDP to one fixed DNS server.

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use std::fmt::Debug;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, trace};

/// Default per-query timeout for [`DnsServerResolver`]
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest UDP response we accept
const UDP_RECV_BUFFER_SIZE: usize = 4096;

/// Turns a host name into addresses
#[async_trait]
pub trait Resolver: Send + Sync + Debug {
    /// Resolve `host` to one or more addresses, in preference order
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Resolver that queries a single DNS server
///
/// Queries go over UDP. A truncated answer is retried over TCP.
#[derive(Debug, Clone)]
pub struct DnsServerResolver {
    server: SocketAddr,
    timeout: Duration,
}

impl DnsServerResolver {
    /// Create a resolver for `server` with the default timeout
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            timeout: DEFAULT_DNS_TIMEOUT,
        }
    }

    /// Set the per-query timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn query(&self, name: &Name, record_type: RecordType) -> io::Result<Vec<IpAddr>> {
        let id = query_id();
        let mut request = Message::new();
        request
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(Query::query(name.clone(), record_type));

        let request_bytes = request
            .to_vec()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        let mut response = self.decode(&self.exchange_udp(&request_bytes).await?, id)?;
        if response.truncated() {
            debug!("Truncated answer for {} {:?}, retrying over TCP", name, record_type);
            response = self.decode(&self.exchange_tcp(&request_bytes).await?, id)?;
        }

        match response.response_code() {
            ResponseCode::NoError => {}
            ResponseCode::NXDomain => return Ok(Vec::new()),
            code => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("DNS server {} answered {}", self.server, code),
                ))
            }
        }

        let addrs = response
            .answers()
            .iter()
            .filter_map(|record| match record.data() {
                Some(RData::A(a)) if record_type == RecordType::A => Some(IpAddr::V4(a.0)),
                Some(RData::AAAA(aaaa)) if record_type == RecordType::AAAA => {
                    Some(IpAddr::V6(aaaa.0))
                }
                _ => None,
            })
            .collect::<Vec<_>>();

        trace!("{} {:?} -> {:?}", name, record_type, addrs);
        Ok(addrs)
    }

    async fn exchange_udp(&self, request: &[u8]) -> io::Result<Vec<u8>> {
        let bind_addr = if self.server.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(self.server).await?;

        let exchange = async {
            socket.send(request).await?;
            let mut buf = vec![0u8; UDP_RECV_BUFFER_SIZE];
            let len = socket.recv(&mut buf).await?;
            buf.truncate(len);
            Ok::<_, io::Error>(buf)
        };

        timeout(self.timeout, exchange)
            .await
            .map_err(|_| self.timed_out())?
    }

    /// One query over TCP with the 2-byte length prefix
    async fn exchange_tcp(&self, request: &[u8]) -> io::Result<Vec<u8>> {
        let len = u16::try_from(request.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "DNS query too large"))?;

        let exchange = async {
            let mut stream = TcpStream::connect(self.server).await?;
            let mut frame = Vec::with_capacity(2 + request.len());
            frame.extend_from_slice(&len.to_be_bytes());
            frame.extend_from_slice(request);
            stream.write_all(&frame).await?;

            let response_len = stream.read_u16().await? as usize;
            if response_len == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "empty TCP DNS response",
                ));
            }
            let mut buf = vec![0u8; response_len];
            stream.read_exact(&mut buf).await?;
            Ok::<_, io::Error>(buf)
        };

        timeout(self.timeout, exchange)
            .await
            .map_err(|_| self.timed_out())?
    }

    fn decode(&self, bytes: &[u8], id: u16) -> io::Result<Message> {
        let response = Message::from_vec(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        if response.id() != id {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("DNS response id {} does not match query id {}", response.id(), id),
            ));
        }
        Ok(response)
    }

    fn timed_out(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::TimedOut,
            format!("DNS query to {} timed out", self.server),
        )
    }
}

#[async_trait]
impl Resolver for DnsServerResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let fqdn = format!("{}.", host.trim_end_matches('.'));
        let name = Name::from_utf8(&fqdn)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        let (v4, v6) = tokio::join!(
            self.query(&name, RecordType::A),
            self.query(&name, RecordType::AAAA)
        );

        let mut addrs = Vec::new();
        let mut last_err = None;
        for result in [v4, v6] {
            match result {
                Ok(found) => addrs.extend(found),
                Err(e) => {
                    debug!("DNS lookup of {} via {} failed: {}", host, self.server, e);
                    last_err = Some(e);
                }
            }
        }

        match (addrs.is_empty(), last_err) {
            (true, Some(e)) => Err(e),
            (true, None) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses found for {}", host),
            )),
            (false, _) => Ok(addrs),
        }
    }
}

fn query_id() -> u16 {
    rand::random::<u16>()
}
