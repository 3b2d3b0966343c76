//! SOCKS5 reply builder

use crate::error::SocksError;
use crate::socks::consts::*;
use crate::socks::types::{bind_address, AddressType};
use bytes::{BufMut, Bytes, BytesMut};
use std::net::{IpAddr, SocketAddr};

/// A SOCKS5 reply
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks5Reply {
    /// Reply code
    pub code: u8,
    /// Encoding used for the bind address
    pub address_type: AddressType,
    /// Bind address literal or domain name
    pub bind_address: String,
    /// Bind port
    pub bind_port: u16,
}

impl Socks5Reply {
    /// Build a reply, deriving the address type from the literal form of
    /// `bind_address`
    pub fn new(code: u8, bind_address: impl Into<String>, bind_port: u16) -> Self {
        let bind_address = bind_address.into();
        Socks5Reply {
            code,
            address_type: AddressType::of_host(&bind_address),
            bind_address,
            bind_port,
        }
    }

    /// Success reply reporting the local end of the destination socket
    pub fn succeeded(local_addr: SocketAddr) -> Self {
        let (address, port) = bind_address(&local_addr);
        Socks5Reply::new(SOCKS5_REPLY_SUCCEEDED, address, port)
    }

    /// Encode to the wire form
    ///
    /// Fails with [`SocksError::InvalidBindAddress`] if the address does not
    /// fit its type, including domain names longer than 255 bytes.
    pub fn to_bytes(&self) -> Result<Bytes, SocksError> {
        let mut buf = BytesMut::with_capacity(6 + MAX_DOMAIN_LEN + 1);
        buf.put_u8(SOCKS5_VERSION);
        buf.put_u8(self.code);
        buf.put_u8(SOCKS5_RESERVED);
        buf.put_u8(self.address_type.to_byte());

        match self.address_type {
            AddressType::Ipv4 => match self.parse_ip()? {
                IpAddr::V4(ip) => buf.put_slice(&ip.octets()),
                IpAddr::V6(ip) => {
                    return Err(SocksError::InvalidBindAddress(format!(
                        "{} is not an IPv4 address",
                        ip
                    )))
                }
            },
            AddressType::Ipv6 => {
                let ip = match self.parse_ip()? {
                    IpAddr::V4(ip) => ip.to_ipv6_mapped(),
                    IpAddr::V6(ip) => ip,
                };
                buf.put_slice(&ip.octets());
            }
            AddressType::DomainName => {
                let domain = self.bind_address.as_bytes();
                if domain.len() > MAX_DOMAIN_LEN {
                    return Err(SocksError::InvalidBindAddress(format!(
                        "domain name is {} bytes, limit is {}",
                        domain.len(),
                        MAX_DOMAIN_LEN
                    )));
                }
                buf.put_u8(domain.len() as u8);
                buf.put_slice(domain);
            }
        }

        buf.put_u16(self.bind_port);
        Ok(buf.freeze())
    }

    fn parse_ip(&self) -> Result<IpAddr, SocksError> {
        self.bind_address
            .parse::<IpAddr>()
            .map(|ip| ip.to_canonical())
            .map_err(|_| {
                SocksError::InvalidBindAddress(format!(
                    "{} is not an IP address",
                    self.bind_address
                ))
            })
    }
}

/// Rejection frame with `code` and a `0.0.0.0:0` bind address
pub fn rejection(code: u8) -> [u8; 10] {
    [
        SOCKS5_VERSION,
        code,
        SOCKS5_RESERVED,
        SOCKS5_ADDR_TYPE_IPV4,
        0,
        0,
        0,
        0,
        0,
        0,
    ]
}
