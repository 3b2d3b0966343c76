//! TCP listener and accept loop

use crate::config::ServerConfig;
use crate::dialer::DirectDialer;
use crate::error::ServerError;
use crate::resolver::{DnsServerResolver, Resolver, SystemResolver};
use crate::socks::{handle_connection, PasswordAuth, SocksContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Pause after a failed accept, so a persistent error does not spin
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(100);

/// SOCKS4a/SOCKS5 server
#[derive(Debug, Clone)]
pub struct SocksServer {
    context: Arc<SocksContext>,
}

impl SocksServer {
    /// Create a server, validating the context first
    ///
    /// Fails with [`ServerError::InvalidAuthMethod`] if any configured
    /// method code is outside the allowed ranges.
    pub fn new(context: SocksContext) -> Result<Self, ServerError> {
        context.validate()?;
        Ok(Self {
            context: Arc::new(context),
        })
    }

    /// Build a server from configuration
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::Config)?;

        let resolver: Arc<dyn Resolver> = match config.dns_server().map_err(ServerError::Config)? {
            Some(server) => Arc::new(DnsServerResolver::new(server)),
            None => Arc::new(SystemResolver),
        };

        let mut context = SocksContext::new(Arc::new(DirectDialer::new(resolver)))
            .with_connect_timeout(Duration::from_secs(config.connect_timeout));

        if let Some(auth) = &config.auth {
            context = context.with_auth_method(Arc::new(PasswordAuth::new(
                auth.username.clone(),
                auth.password.clone(),
            )));
        }

        Self::new(context)
    }

    /// Shared handler state
    pub fn context(&self) -> &SocksContext {
        &self.context
    }

    /// Bind `addr` and serve until shutdown
    pub async fn listen_and_serve(
        &self,
        addr: &str,
        shutdown_rx: broadcast::Receiver<bool>,
    ) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        self.serve(listener, shutdown_rx).await
    }

    /// Accept connections from `listener` until a shutdown signal arrives
    ///
    /// Each connection runs in its own task. Accept errors are logged and
    /// the loop continues.
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<bool>,
    ) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!("Accepted connection from {}", peer);
                            let context = Arc::clone(&self.context);
                            tokio::spawn(async move {
                                serve_connection(stream, peer, context).await;
                            });
                        }
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_ERROR_DELAY).await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn serve_connection(stream: TcpStream, peer: std::net::SocketAddr, context: Arc<SocksContext>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
    }

    match handle_connection(stream, &context).await {
        Ok(()) => debug!("Connection from {} closed", peer),
        Err(e) if e.is_relay_failure() => debug!("Connection from {} ended: {}", peer, e),
        Err(e) => warn!("Connection from {} failed: {}", peer, e),
    }
}
