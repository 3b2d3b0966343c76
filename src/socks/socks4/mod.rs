//! SOCKS4 / SOCKS4a protocol
//!
//! Only CONNECT is served. User ids are read and discarded.

mod handler;
mod parser;
mod reply;

pub use handler::handle_socks4a;
pub use parser::{parse_request, Socks4Header, Socks4Request};
pub use reply::Socks4Reply;
