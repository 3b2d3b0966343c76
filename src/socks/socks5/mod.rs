//! SOCKS5 protocol
//!
//! Method negotiation lives in [`crate::socks::auth`]. Only CONNECT is
//! served; BIND and UDP ASSOCIATE are answered with "command not supported".

mod handler;
mod parser;
mod reply;

pub use handler::handle_socks5;
pub use parser::{parse_request, Socks5Request, Socks5RequestHeader};
pub use reply::Socks5Reply;
