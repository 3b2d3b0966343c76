//! SOCKS4a request parser

use crate::error::SocksError;
use crate::socks::consts::MAX_DOMAIN_LEN;
use crate::socks::types::SocksCommand;
use std::net::Ipv4Addr;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Fixed part of a SOCKS4 request
///
/// ```text
/// +----+----+----+----+----+----+----+----+----+----+....+----+
/// | VN | CD | DSTPORT |      DSTIP        | USERID       |NULL|
/// +----+----+----+----+----+----+----+----+----+----+....+----+
///   1    1      2              4           variable       1
/// ```
///
/// VN is consumed by the dispatcher, so this reads CD, DSTPORT and DSTIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Socks4Header {
    /// Requested command
    pub command: SocksCommand,
    /// Destination port
    pub port: u16,
    /// Destination address, or the SOCKS4a placeholder `0.0.0.x`
    pub ip: Ipv4Addr,
}

/// A fully parsed SOCKS4/4a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks4Request {
    /// Requested command
    pub command: SocksCommand,
    /// Dotted-decimal address, or the domain name for SOCKS4a
    pub destination_host: String,
    /// Destination port
    pub destination_port: u16,
}

impl Socks4Header {
    /// Read the 7 fixed bytes after the version
    pub async fn read_from<S>(stream: &mut S) -> Result<Self, SocksError>
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = [0u8; 7];
        stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| SocksError::malformed("request header", e))?;

        Ok(Socks4Header {
            command: SocksCommand::from_socks4_byte(buf[0]),
            port: u16::from_be_bytes([buf[1], buf[2]]),
            ip: Ipv4Addr::new(buf[3], buf[4], buf[5], buf[6]),
        })
    }

    /// True for `0.0.0.x` with `x != 0`, which announces a SOCKS4a domain
    pub fn is_domain_placeholder(&self) -> bool {
        let octets = self.ip.octets();
        octets[..3] == [0, 0, 0] && octets[3] != 0
    }

    /// Read the user id and, for SOCKS4a, the domain name
    pub async fn read_rest<S>(self, stream: &mut S) -> Result<Socks4Request, SocksError>
    where
        S: AsyncRead + Unpin,
    {
        skip_until_nul(stream).await?;

        let destination_host = if self.is_domain_placeholder() {
            read_domain(stream).await?
        } else {
            self.ip.to_string()
        };

        trace!(
            "Parsed SOCKS4 request: {} {}:{}",
            self.command,
            destination_host,
            self.port
        );

        Ok(Socks4Request {
            command: self.command,
            destination_host,
            destination_port: self.port,
        })
    }
}

/// Parse a whole SOCKS4/4a request in one go
pub async fn parse_request<S>(stream: &mut S) -> Result<Socks4Request, SocksError>
where
    S: AsyncRead + Unpin,
{
    Socks4Header::read_from(stream).await?.read_rest(stream).await
}

async fn skip_until_nul<S>(stream: &mut S) -> Result<(), SocksError>
where
    S: AsyncRead + Unpin,
{
    loop {
        let byte = stream
            .read_u8()
            .await
            .map_err(|e| SocksError::malformed("user id", e))?;
        if byte == 0 {
            return Ok(());
        }
    }
}

async fn read_domain<S>(stream: &mut S) -> Result<String, SocksError>
where
    S: AsyncRead + Unpin,
{
    let mut domain = Vec::new();
    loop {
        let byte = stream
            .read_u8()
            .await
            .map_err(|e| SocksError::malformed("domain name", e))?;
        if byte == 0 {
            break;
        }
        if domain.len() == MAX_DOMAIN_LEN {
            return Err(SocksError::MalformedRequest(format!(
                "domain name longer than {} bytes",
                MAX_DOMAIN_LEN
            )));
        }
        domain.push(byte);
    }

    String::from_utf8(domain)
        .map_err(|_| SocksError::MalformedRequest("domain name is not valid UTF-8".to_string()))
}
