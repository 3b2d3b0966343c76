//! SOCKS5 authentication module
//!
//! Handles method negotiation and the pluggable [`AuthMethod`] capability
//! used once a method has been selected.

mod none;
mod password;

pub use none::NoAuth;
pub use password::PasswordAuth;

use super::consts::*;
use super::send_frame;
use crate::error::{ServerError, SocksError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, trace};

/// Stream handed to [`AuthMethod::verify`]
pub trait AuthStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AuthStream for T {}

/// A SOCKS5 authentication method
///
/// Methods are identified by their one-byte code. After the server has
/// announced the selected code, [`verify`](AuthMethod::verify) runs the
/// method's sub-negotiation directly on the client stream.
#[async_trait]
pub trait AuthMethod: Send + Sync + fmt::Debug {
    /// Method code sent during negotiation
    fn code(&self) -> u8;

    /// Human-readable method name
    fn name(&self) -> &str;

    /// Run the sub-negotiation and verify the client's credentials
    async fn verify(&self, stream: &mut dyn AuthStream) -> Result<(), SocksError>;
}

/// Whether `code` may be used by a configured method
///
/// Only 0x00-0x02 and the private range 0x80-0xFE are allowed.
pub fn is_valid_code(code: u8) -> bool {
    code <= SOCKS5_AUTH_METHOD_PASSWORD
        || (SOCKS5_AUTH_METHOD_PRIVATE_FIRST..=SOCKS5_AUTH_METHOD_PRIVATE_LAST).contains(&code)
}

/// Check every configured method code. Called once at startup.
pub fn validate_auth_methods(methods: &[Arc<dyn AuthMethod>]) -> Result<(), ServerError> {
    for method in methods {
        if !is_valid_code(method.code()) {
            return Err(ServerError::InvalidAuthMethod {
                code: method.code(),
                name: method.name().to_string(),
            });
        }
    }
    Ok(())
}

/// Pick the first configured method whose code the client offered
pub fn select_auth_method<'a>(
    offered: &[u8],
    configured: &'a [Arc<dyn AuthMethod>],
) -> Option<&'a Arc<dyn AuthMethod>> {
    configured
        .iter()
        .find(|method| offered.contains(&method.code()))
}

/// Method-selection message
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
///
/// The version byte has already been consumed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Offered method codes, in client order
    pub methods: Vec<u8>,
}

impl HandshakeRequest {
    /// Read NMETHODS and METHODS from the stream
    pub async fn read_from<S>(stream: &mut S) -> Result<Self, SocksError>
    where
        S: AsyncRead + Unpin,
    {
        let num_methods = stream
            .read_u8()
            .await
            .map_err(|e| SocksError::malformed("number of auth methods", e))?;

        let mut methods = vec![0u8; num_methods as usize];
        stream
            .read_exact(&mut methods)
            .await
            .map_err(|e| SocksError::malformed("list of auth methods", e))?;

        Ok(HandshakeRequest { methods })
    }
}

/// Perform method negotiation, then the selected method's verification
///
/// Replies `05 FF` when the handshake cannot be read or nothing offered is
/// configured. Returns the method that authenticated the client.
pub async fn authenticate<S>(
    stream: &mut S,
    methods: &[Arc<dyn AuthMethod>],
) -> Result<Arc<dyn AuthMethod>, SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let request = match HandshakeRequest::read_from(stream).await {
        Ok(request) => request,
        Err(e) => return Err(reject(stream, e).await),
    };

    trace!("Offered auth methods: {:?}", request.methods);

    let method = match select_auth_method(&request.methods, methods) {
        Some(method) => Arc::clone(method),
        None => return Err(reject(stream, SocksError::NoAcceptableAuth).await),
    };

    send_frame(stream, &[SOCKS5_VERSION, method.code()])
        .await
        .map_err(SocksError::ConnectionWrite)?;

    debug!("Selected auth method: {}", method.name());

    method.verify(stream).await?;

    Ok(method)
}

async fn reject<S>(stream: &mut S, cause: SocksError) -> SocksError
where
    S: AsyncWrite + Unpin,
{
    match send_frame(stream, &[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE]).await {
        Ok(()) => cause,
        Err(e) => SocksError::reply_failed(cause, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[derive(Debug)]
    struct CustomAuth(u8);

    #[async_trait]
    impl AuthMethod for CustomAuth {
        fn code(&self) -> u8 {
            self.0
        }

        fn name(&self) -> &str {
            "CUSTOM"
        }

        async fn verify(&self, _stream: &mut dyn AuthStream) -> Result<(), SocksError> {
            Ok(())
        }
    }

    #[test]
    fn test_is_valid_code() {
        assert!(is_valid_code(0x00));
        assert!(is_valid_code(0x01));
        assert!(is_valid_code(0x02));
        assert!(!is_valid_code(0x03));
        assert!(!is_valid_code(0x7F));
        assert!(is_valid_code(0x80));
        assert!(is_valid_code(0xFE));
        assert!(!is_valid_code(0xFF));
    }

    #[test]
    fn test_validate_auth_methods() {
        let ok: Vec<Arc<dyn AuthMethod>> = vec![Arc::new(NoAuth), Arc::new(CustomAuth(0x85))];
        assert!(validate_auth_methods(&ok).is_ok());

        let bad: Vec<Arc<dyn AuthMethod>> = vec![Arc::new(NoAuth), Arc::new(CustomAuth(0x10))];
        let err = validate_auth_methods(&bad).unwrap_err();
        assert!(matches!(
            err,
            ServerError::InvalidAuthMethod { code: 0x10, .. }
        ));
    }

    #[test]
    fn test_select_auth_method_prefers_configured_order() {
        let configured: Vec<Arc<dyn AuthMethod>> = vec![
            Arc::new(PasswordAuth::new("user", "pass")),
            Arc::new(NoAuth),
        ];

        let selected = select_auth_method(&[0x00, 0x02], &configured).unwrap();
        assert_eq!(selected.code(), SOCKS5_AUTH_METHOD_PASSWORD);

        let selected = select_auth_method(&[0x00], &configured).unwrap();
        assert_eq!(selected.code(), SOCKS5_AUTH_METHOD_NONE);

        assert!(select_auth_method(&[0x01, 0x80], &configured).is_none());
        assert!(select_auth_method(&[], &configured).is_none());
    }

    #[tokio::test]
    async fn test_handshake_request_read() {
        let mut cursor = std::io::Cursor::new(vec![2u8, 0x00, 0x02]);
        let request = HandshakeRequest::read_from(&mut cursor).await.unwrap();
        assert_eq!(request.methods, vec![0x00, 0x02]);
    }

    #[tokio::test]
    async fn test_handshake_request_truncated() {
        let mut cursor = std::io::Cursor::new(vec![3u8, 0x00]);
        let result = HandshakeRequest::read_from(&mut cursor).await;
        assert!(matches!(result, Err(SocksError::MalformedRequest(_))));
    }

    #[tokio::test]
    async fn test_authenticate_no_auth() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[1, SOCKS5_AUTH_METHOD_NONE])
            .write(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE])
            .build();

        let configured: Vec<Arc<dyn AuthMethod>> = vec![Arc::new(NoAuth)];
        let method = authenticate(&mut stream, &configured).await.unwrap();
        assert_eq!(method.code(), SOCKS5_AUTH_METHOD_NONE);
    }

    #[tokio::test]
    async fn test_authenticate_no_acceptable_method() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[1, SOCKS5_AUTH_METHOD_PASSWORD])
            .write(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE])
            .build();

        let configured: Vec<Arc<dyn AuthMethod>> = vec![Arc::new(NoAuth)];
        let result = authenticate(&mut stream, &configured).await;
        assert!(matches!(result, Err(SocksError::NoAcceptableAuth)));
    }

    #[tokio::test]
    async fn test_authenticate_password() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let mut request = vec![1, SOCKS5_AUTH_METHOD_PASSWORD];
        request.extend_from_slice(&[SOCKS5_AUTH_VERSION, 4]);
        request.extend_from_slice(b"user");
        request.push(4);
        request.extend_from_slice(b"pass");
        client.write_all(&request).await.unwrap();

        let configured: Vec<Arc<dyn AuthMethod>> = vec![Arc::new(PasswordAuth::new("user", "pass"))];
        let method = authenticate(&mut server, &configured).await.unwrap();
        assert_eq!(method.name(), "USERNAME/PASSWORD");

        let mut response = [0u8; 4];
        tokio::io::AsyncReadExt::read_exact(&mut client, &mut response)
            .await
            .unwrap();
        assert_eq!(
            response,
            [SOCKS5_VERSION, SOCKS5_AUTH_METHOD_PASSWORD, SOCKS5_AUTH_VERSION, 0x00]
        );
    }

    #[tokio::test]
    async fn test_authenticate_truncated_handshake_replies_not_acceptable() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(&[2, SOCKS5_AUTH_METHOD_NONE]).await.unwrap();
        client.shutdown().await.unwrap();

        let configured: Vec<Arc<dyn AuthMethod>> = vec![Arc::new(NoAuth)];
        let result = authenticate(&mut server, &configured).await;
        assert!(matches!(result, Err(SocksError::MalformedRequest(_))));

        let mut response = [0u8; 2];
        tokio::io::AsyncReadExt::read_exact(&mut client, &mut response)
            .await
            .unwrap();
        assert_eq!(response, [SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE]);
    }
}
