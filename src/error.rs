//! Error types for socks-server
//!
//! [`SocksError`] covers everything that can end a single proxied
//! connection. [`ServerError`] covers startup and listener failures.

use crate::socks::{RelayDirection, SocksCommand};
use std::io;
use thiserror::Error;

/// Per-connection error
///
/// Every variant is local to the connection that produced it; none of them
/// should ever stop the accept loop.
#[derive(Error, Debug)]
pub enum SocksError {
    /// The client went away before sending the version byte
    #[error("could not read from client: {0}")]
    ConnectionRead(#[source] io::Error),

    /// Writing a reply on the success path failed
    #[error("could not write to client: {0}")]
    ConnectionWrite(#[source] io::Error),

    /// Structurally invalid or truncated frame
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Unknown SOCKS version byte
    #[error("unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Anything other than CONNECT
    #[error("unsupported command: {0}")]
    UnsupportedCommand(SocksCommand),

    /// Address type other than IPv4, domain name or IPv6
    #[error("unsupported address type: {0}")]
    UnsupportedAddressType(u8),

    /// None of the offered auth methods is configured
    #[error("no acceptable authentication method")]
    NoAcceptableAuth,

    /// Credentials rejected. Never says which field was wrong.
    #[error("auth failed: username or password is incorrect")]
    AuthVerificationFailed,

    /// Timeout, refusal or unreachable destination
    #[error("could not connect to {target}: {source}")]
    DialFailure {
        /// `host:port` as requested by the client
        target: String,
        /// Underlying dial error
        #[source]
        source: io::Error,
    },

    /// The local bind address cannot be encoded in the reply frame
    #[error("invalid bind address: {0}")]
    InvalidBindAddress(String),

    /// One relay direction failed. Expected when either peer hangs up hard.
    #[error("could not copy from {direction}: {source}")]
    RelayFailure {
        /// The direction that finished first
        direction: RelayDirection,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The rejection reply for `cause` could not be sent
    #[error("{cause} (rejection reply not sent: {source})")]
    ReplyFailed {
        /// The failure the reply was reporting
        cause: Box<SocksError>,
        /// Why the reply could not be written
        #[source]
        source: io::Error,
    },
}

impl SocksError {
    pub(crate) fn malformed(what: &str, err: io::Error) -> Self {
        SocksError::MalformedRequest(format!("could not read {}: {}", what, err))
    }

    pub(crate) fn reply_failed(cause: SocksError, source: io::Error) -> Self {
        SocksError::ReplyFailed {
            cause: Box::new(cause),
            source,
        }
    }

    /// True for relay failures, which are informational only
    pub fn is_relay_failure(&self) -> bool {
        matches!(self, SocksError::RelayFailure { .. })
    }

    /// The original failure, looking through [`SocksError::ReplyFailed`]
    pub fn cause(&self) -> &SocksError {
        match self {
            SocksError::ReplyFailed { cause, .. } => cause.cause(),
            other => other,
        }
    }
}

/// Server startup and listener errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Auth method code outside 0x00-0x02 and 0x80-0xFE
    #[error("invalid auth code ({code}) with name ({name})")]
    InvalidAuthMethod {
        /// Offending method code
        code: u8,
        /// Method name
        name: String,
    },
}
