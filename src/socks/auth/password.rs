//! Username/password authentication
//!
//! Implements the RFC 1929 sub-negotiation for SOCKS5.

use super::{AuthMethod, AuthStream};
use crate::error::SocksError;
use crate::socks::consts::{MAX_DOMAIN_LEN, SOCKS5_AUTH_METHOD_PASSWORD, SOCKS5_AUTH_VERSION};
use crate::socks::send_frame;
use async_trait::async_trait;
use std::fmt;
use subtle::{Choice, ConstantTimeEq};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Authentication result codes
const AUTH_SUCCESS: u8 = 0x00;
const AUTH_FAILURE: u8 = 0x01;

/// Longest username or password the wire format can carry
const MAX_FIELD_LEN: usize = MAX_DOMAIN_LEN;

/// Checks a client's username and password against one configured pair
#[derive(Clone)]
pub struct PasswordAuth {
    username: String,
    password: String,
}

impl PasswordAuth {
    /// Create a method that accepts exactly `username` / `password`
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn matches(&self, username: &[u8], password: &[u8]) -> bool {
        let user_ok = constant_time_eq(self.username.as_bytes(), username);
        let pass_ok = constant_time_eq(self.password.as_bytes(), password);
        bool::from(user_ok & pass_ok)
    }
}

impl fmt::Debug for PasswordAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Client request
///
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
/// +----+------+----------+------+----------+
/// ```
struct Credentials {
    version: u8,
    username: Vec<u8>,
    password: Vec<u8>,
}

impl Credentials {
    async fn read_from<S>(stream: &mut S) -> Result<Self, SocksError>
    where
        S: AsyncRead + Unpin + ?Sized,
    {
        let version = stream
            .read_u8()
            .await
            .map_err(|e| SocksError::malformed("auth version", e))?;
        let username = read_field(stream, "username").await?;
        let password = read_field(stream, "password").await?;

        Ok(Credentials {
            version,
            username,
            password,
        })
    }
}

async fn read_field<S>(stream: &mut S, what: &str) -> Result<Vec<u8>, SocksError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let len = stream
        .read_u8()
        .await
        .map_err(|e| SocksError::malformed(what, e))?;
    let mut field = vec![0u8; len as usize];
    stream
        .read_exact(&mut field)
        .await
        .map_err(|e| SocksError::malformed(what, e))?;
    Ok(field)
}

/// Compare two fields of at most 255 bytes without branching on content
///
/// Both sides are copied into fixed-size buffers so the comparison touches
/// the same number of bytes whatever the inputs are. Fields longer than
/// 255 bytes never match.
fn constant_time_eq(expected: &[u8], provided: &[u8]) -> Choice {
    let a = pad_field(expected);
    let b = pad_field(provided);

    let same_len = (expected.len() as u64).ct_eq(&(provided.len() as u64));
    let fits = Choice::from(
        (expected.len() <= MAX_FIELD_LEN) as u8 & (provided.len() <= MAX_FIELD_LEN) as u8,
    );
    a[..].ct_eq(&b[..]) & same_len & fits
}

/// Copy `field` into a zeroed 255-byte buffer, cutting anything longer
fn pad_field(field: &[u8]) -> [u8; MAX_FIELD_LEN] {
    let mut buf = [0u8; MAX_FIELD_LEN];
    let len = field.len().min(MAX_FIELD_LEN);
    buf[..len].copy_from_slice(&field[..len]);
    buf
}

#[async_trait]
impl AuthMethod for PasswordAuth {
    fn code(&self) -> u8 {
        SOCKS5_AUTH_METHOD_PASSWORD
    }

    fn name(&self) -> &str {
        "USERNAME/PASSWORD"
    }

    async fn verify(&self, stream: &mut dyn AuthStream) -> Result<(), SocksError> {
        let credentials = Credentials::read_from(stream).await?;

        let accepted = credentials.version == SOCKS5_AUTH_VERSION
            && self.matches(&credentials.username, &credentials.password);

        if !accepted {
            if credentials.version != SOCKS5_AUTH_VERSION {
                debug!("Invalid auth version: {}", credentials.version);
            }
            return match send_frame(stream, &[SOCKS5_AUTH_VERSION, AUTH_FAILURE]).await {
                Ok(()) => Err(SocksError::AuthVerificationFailed),
                Err(e) => Err(SocksError::reply_failed(SocksError::AuthVerificationFailed, e)),
            };
        }

        send_frame(stream, &[SOCKS5_AUTH_VERSION, AUTH_SUCCESS])
            .await
            .map_err(SocksError::ConnectionWrite)?;

        debug!("Client authenticated");
        Ok(())
    }
}
