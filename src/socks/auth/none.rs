//! No-authentication method

use super::{AuthMethod, AuthStream};
use crate::error::SocksError;
use crate::socks::consts::SOCKS5_AUTH_METHOD_NONE;
use async_trait::async_trait;

/// Accepts every client without a sub-negotiation
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl AuthMethod for NoAuth {
    fn code(&self) -> u8 {
        SOCKS5_AUTH_METHOD_NONE
    }

    fn name(&self) -> &str {
        "NO AUTHENTICATION REQUIRED"
    }

    async fn verify(&self, _stream: &mut dyn AuthStream) -> Result<(), SocksError> {
        Ok(())
    }
}
