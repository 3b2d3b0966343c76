//! Shared, read-only state for protocol handlers

use super::auth::{validate_auth_methods, AuthMethod, NoAuth};
use super::consts::DEFAULT_CONNECT_TIMEOUT_SECS;
use crate::dialer::Dialer;
use crate::error::ServerError;
use std::sync::Arc;
use std::time::Duration;

/// Everything a handler needs besides the client stream
///
/// Built once at startup and shared by all connections. Defaults to the
/// no-authentication method until another method is added.
#[derive(Debug, Clone)]
pub struct SocksContext {
    dialer: Arc<dyn Dialer>,
    auth_methods: Vec<Arc<dyn AuthMethod>>,
    implicit_no_auth: bool,
    connect_timeout: Duration,
}

impl SocksContext {
    /// Create a context using `dialer` and accepting unauthenticated clients
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self {
            dialer,
            auth_methods: vec![Arc::new(NoAuth)],
            implicit_no_auth: true,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Add an authentication method
    ///
    /// The first explicit method replaces the default no-auth entry. Order
    /// of addition is the selection preference.
    pub fn with_auth_method(mut self, method: Arc<dyn AuthMethod>) -> Self {
        if self.implicit_no_auth {
            self.auth_methods.clear();
            self.implicit_no_auth = false;
        }
        self.auth_methods.push(method);
        self
    }

    /// Add several authentication methods, in preference order
    pub fn with_auth_methods<I>(self, methods: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn AuthMethod>>,
    {
        methods
            .into_iter()
            .fold(self, |ctx, method| ctx.with_auth_method(method))
    }

    /// Set the timeout applied to every destination dial
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Dialer used for destinations
    pub fn dialer(&self) -> &Arc<dyn Dialer> {
        &self.dialer
    }

    /// Configured auth methods, in preference order
    pub fn auth_methods(&self) -> &[Arc<dyn AuthMethod>] {
        &self.auth_methods
    }

    /// Timeout applied to every destination dial
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Startup checks: auth method codes and a non-zero connect timeout
    pub fn validate(&self) -> Result<(), ServerError> {
        validate_auth_methods(&self.auth_methods)?;

        if self.connect_timeout.is_zero() {
            return Err(ServerError::Config(
                "connect timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
