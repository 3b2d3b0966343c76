//! Server configuration types
//!
//! Defines the configuration structures for the SOCKS server.

use crate::socks::consts::{DEFAULT_CONNECT_TIMEOUT_SECS, MAX_DOMAIN_LEN};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Default listen address
pub const DEFAULT_BIND: &str = "0.0.0.0:5555";

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// SOCKS server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:5555")
    #[serde(default = "default_bind")]
    pub bind: String,

    /// DNS server as `ip:port`; the system resolver is used when unset
    #[serde(default)]
    pub dns: Option<String>,

    /// Destination connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Username/password authentication; no-auth when unset
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

/// Credentials for USERNAME/PASSWORD authentication
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Username
    pub username: String,
    /// Password, may be empty
    #[serde(default)]
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            dns: None,
            connect_timeout: default_connect_timeout(),
            auth: None,
        }
    }
}

impl ServerConfig {
    /// Parsed DNS server address, if one is configured
    pub fn dns_server(&self) -> Result<Option<SocketAddr>, String> {
        match &self.dns {
            None => Ok(None),
            Some(dns) => dns
                .parse::<SocketAddr>()
                .map(Some)
                .map_err(|_| format!("DNS server must be ip:port, got {:?}", dns)),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.bind.is_empty() {
            return Err("bind address must not be empty".to_string());
        }

        self.dns_server()?;

        if self.connect_timeout == 0 {
            return Err("connect_timeout must be greater than zero".to_string());
        }

        if let Some(auth) = &self.auth {
            if auth.username.is_empty() || auth.username.len() > MAX_DOMAIN_LEN {
                return Err(format!(
                    "username must be 1 to {} bytes long",
                    MAX_DOMAIN_LEN
                ));
            }
            if auth.password.len() > MAX_DOMAIN_LEN {
                return Err(format!(
                    "password must be at most {} bytes long",
                    MAX_DOMAIN_LEN
                ));
            }
        }

        Ok(())
    }
}
