//! SOCKS type definitions
//!
//! Types shared by the SOCKS4a and SOCKS5 codecs.

use super::consts::*;
use crate::error::SocksError;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Request command, as carried by both protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - wait for incoming connection (not supported)
    Bind,
    /// UDP ASSOCIATE - establish UDP relay (not supported)
    UdpAssociate,
    /// Any other command byte
    Unknown(u8),
}

impl SocksCommand {
    /// Parse a SOCKS4 command byte. SOCKS4 has no UDP ASSOCIATE.
    pub fn from_socks4_byte(byte: u8) -> Self {
        match byte {
            SOCKS4_CMD_CONNECT => SocksCommand::Connect,
            SOCKS4_CMD_BIND => SocksCommand::Bind,
            other => SocksCommand::Unknown(other),
        }
    }

    /// Parse a SOCKS5 command byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => SocksCommand::Connect,
            SOCKS5_CMD_TCP_BIND => SocksCommand::Bind,
            SOCKS5_CMD_UDP_ASSOCIATE => SocksCommand::UdpAssociate,
            other => SocksCommand::Unknown(other),
        }
    }

    /// Convert to the wire byte
    pub fn to_byte(self) -> u8 {
        match self {
            SocksCommand::Connect => SOCKS5_CMD_TCP_CONNECT,
            SocksCommand::Bind => SOCKS5_CMD_TCP_BIND,
            SocksCommand::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
            SocksCommand::Unknown(byte) => byte,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::UdpAssociate => write!(f, "UDP ASSOCIATE"),
            SocksCommand::Unknown(byte) => write!(f, "UNKNOWN({:#04x})", byte),
        }
    }
}

/// SOCKS5 address type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    /// 4-byte IPv4 address
    Ipv4,
    /// Length-prefixed domain name
    DomainName,
    /// 16-byte IPv6 address
    Ipv6,
}

impl AddressType {
    /// Parse an address type byte
    pub fn from_byte(byte: u8) -> Result<Self, SocksError> {
        match byte {
            SOCKS5_ADDR_TYPE_IPV4 => Ok(AddressType::Ipv4),
            SOCKS5_ADDR_TYPE_DOMAIN => Ok(AddressType::DomainName),
            SOCKS5_ADDR_TYPE_IPV6 => Ok(AddressType::Ipv6),
            other => Err(SocksError::UnsupportedAddressType(other)),
        }
    }

    /// Convert to the wire byte
    pub fn to_byte(self) -> u8 {
        match self {
            AddressType::Ipv4 => SOCKS5_ADDR_TYPE_IPV4,
            AddressType::DomainName => SOCKS5_ADDR_TYPE_DOMAIN,
            AddressType::Ipv6 => SOCKS5_ADDR_TYPE_IPV6,
        }
    }

    /// Address type matching the literal form of `host`
    ///
    /// IPv4-mapped IPv6 literals count as IPv4. Anything that is not an IP
    /// literal is a domain name.
    pub fn of_host(host: &str) -> Self {
        match host.parse::<IpAddr>().map(|ip| ip.to_canonical()) {
            Ok(IpAddr::V4(_)) => AddressType::Ipv4,
            Ok(IpAddr::V6(_)) => AddressType::Ipv6,
            Err(_) => AddressType::DomainName,
        }
    }
}

/// Split a local socket address into the `(address, port)` pair sent back
/// in replies. IPv4-mapped IPv6 addresses are reported in IPv4 form.
pub fn bind_address(addr: &SocketAddr) -> (String, u16) {
    (addr.ip().to_canonical().to_string(), addr.port())
}

/// Join host and port the way the dialer expects them, bracketing IPv6
/// literals
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
