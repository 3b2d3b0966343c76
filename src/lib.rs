//! # socks-server - SOCKS4a and SOCKS5 proxy server
//!
//! A TCP proxy server that speaks SOCKS4, SOCKS4a and SOCKS5 on the same
//! port. The first byte of every connection selects the protocol.
//!
//! ## Features
//!
//! - **SOCKS4/4a**: CONNECT with IPv4 or domain-name destinations
//! - **SOCKS5**: CONNECT with IPv4, IPv6 or domain-name destinations
//! - **Authentication**: no-auth or username/password, compared in constant time
//! - **Pluggable DNS**: system resolver or a fixed DNS server
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socks_server::config::ServerConfig;
//! use socks_server::server::SocksServer;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::default();
//!     let server = SocksServer::from_config(&config)?;
//!     let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     server.listen_and_serve(&config.bind, shutdown_rx).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Client -> SocksServer -> handle_connection -> SOCKS4a / SOCKS5 handler
//!                                                  -> Dialer -> Target
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod dialer;
pub mod error;
pub mod resolver;
pub mod server;
pub mod socks;

// Re-export commonly used items
pub use config::{load_config, Config, ServerConfig};
pub use dialer::{Dialer, DirectDialer};
pub use error::{ServerError, SocksError};
pub use resolver::{DnsServerResolver, Resolver, SystemResolver};
pub use server::SocksServer;
pub use socks::{handle_connection, AuthMethod, NoAuth, PasswordAuth, SocksContext};

/// Version of the socks-server library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
