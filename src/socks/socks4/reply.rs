//! SOCKS4 reply builder

use crate::error::SocksError;
use crate::socks::consts::*;
use bytes::{BufMut, Bytes, BytesMut};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// A SOCKS4 reply
///
/// ```text
/// +----+----+----+----+----+----+----+----+
/// | VN | CD | DSTPORT |      DSTIP        |
/// +----+----+----+----+----+----+----+----+
///   1    1      2              4
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks4Reply {
    /// Result code, 90 or 91
    pub code: u8,
    /// Bind address literal, IPv4 or IPv4-mapped IPv6
    pub bind_address: String,
    /// Bind port
    pub bind_port: u16,
}

impl Socks4Reply {
    /// Request granted, reporting the local end of the destination socket
    pub fn granted(local_addr: SocketAddr) -> Self {
        let (address, port) = crate::socks::types::bind_address(&local_addr);
        Socks4Reply {
            code: SOCKS4_REPLY_GRANTED,
            bind_address: address,
            bind_port: port,
        }
    }

    /// Encode to the 8-byte wire form
    ///
    /// Fails with [`SocksError::InvalidBindAddress`] when the bind address is
    /// not an IPv4 (or IPv4-mapped IPv6) literal.
    pub fn to_bytes(&self) -> Result<Bytes, SocksError> {
        let ip = parse_ipv4(&self.bind_address)?;

        let mut buf = BytesMut::with_capacity(8);
        buf.put_u8(SOCKS4_REPLY_VERSION);
        buf.put_u8(self.code);
        buf.put_u16(self.bind_port);
        buf.put_slice(&ip.octets());
        Ok(buf.freeze())
    }
}

fn parse_ipv4(address: &str) -> Result<Ipv4Addr, SocksError> {
    match address.parse::<IpAddr>().map(|ip| ip.to_canonical()) {
        Ok(IpAddr::V4(ip)) => Ok(ip),
        _ => Err(SocksError::InvalidBindAddress(format!(
            "{} is not an IPv4 address",
            address
        ))),
    }
}

/// Rejection frame with `code` and a `0.0.0.0:0` bind address
pub fn rejection(code: u8) -> [u8; 8] {
    [SOCKS4_REPLY_VERSION, code, 0, 0, 0, 0, 0, 0]
}
