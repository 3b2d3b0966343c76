//! SOCKS5 request parser

use crate::error::SocksError;
use crate::socks::consts::SOCKS5_VERSION;
use crate::socks::types::{AddressType, SocksCommand};
use std::net::{Ipv4Addr, Ipv6Addr};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Fixed 4-byte prefix of a SOCKS5 request
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Socks5RequestHeader {
    /// VER as sent by the client
    pub version: u8,
    /// Requested command
    pub command: SocksCommand,
    /// Raw ATYP byte
    pub address_type: u8,
}

/// A fully parsed SOCKS5 request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks5Request {
    /// Requested command
    pub command: SocksCommand,
    /// Address type the destination was sent as
    pub address_type: AddressType,
    /// Dotted-decimal, textual IPv6 or domain name
    pub destination_host: String,
    /// Destination port
    pub destination_port: u16,
}

impl Socks5RequestHeader {
    /// Read VER, CMD, RSV and ATYP
    pub async fn read_from<S>(stream: &mut S) -> Result<Self, SocksError>
    where
        S: AsyncRead + Unpin,
    {
        let mut header = [0u8; 4];
        stream
            .read_exact(&mut header)
            .await
            .map_err(|e| SocksError::malformed("request header", e))?;

        Ok(Socks5RequestHeader {
            version: header[0],
            command: SocksCommand::from_byte(header[1]),
            address_type: header[3],
        })
    }

    /// Validate the header and read the destination address and port
    pub async fn read_rest<S>(self, stream: &mut S) -> Result<Socks5Request, SocksError>
    where
        S: AsyncRead + Unpin,
    {
        if self.version != SOCKS5_VERSION {
            return Err(SocksError::UnsupportedVersion(self.version));
        }

        let address_type = AddressType::from_byte(self.address_type)?;

        let destination_host = match address_type {
            AddressType::Ipv4 => {
                let mut addr = [0u8; 4];
                stream
                    .read_exact(&mut addr)
                    .await
                    .map_err(|e| SocksError::malformed("IPv4 address", e))?;
                Ipv4Addr::from(addr).to_string()
            }
            AddressType::DomainName => {
                let len = stream
                    .read_u8()
                    .await
                    .map_err(|e| SocksError::malformed("domain length", e))?;
                if len == 0 {
                    return Err(SocksError::MalformedRequest(
                        "empty domain name".to_string(),
                    ));
                }
                let mut domain = vec![0u8; len as usize];
                stream
                    .read_exact(&mut domain)
                    .await
                    .map_err(|e| SocksError::malformed("domain name", e))?;
                String::from_utf8(domain).map_err(|_| {
                    SocksError::MalformedRequest("domain name is not valid UTF-8".to_string())
                })?
            }
            AddressType::Ipv6 => {
                let mut addr = [0u8; 16];
                stream
                    .read_exact(&mut addr)
                    .await
                    .map_err(|e| SocksError::malformed("IPv6 address", e))?;
                Ipv6Addr::from(addr).to_string()
            }
        };

        let destination_port = stream
            .read_u16()
            .await
            .map_err(|e| SocksError::malformed("port", e))?;

        trace!(
            "Parsed SOCKS5 request: {} {}:{}",
            self.command,
            destination_host,
            destination_port
        );

        Ok(Socks5Request {
            command: self.command,
            address_type,
            destination_host,
            destination_port,
        })
    }
}

/// Parse a whole SOCKS5 request in one go
pub async fn parse_request<S>(stream: &mut S) -> Result<Socks5Request, SocksError>
where
    S: AsyncRead + Unpin,
{
    Socks5RequestHeader::read_from(stream)
        .await?
        .read_rest(stream)
        .await
}
