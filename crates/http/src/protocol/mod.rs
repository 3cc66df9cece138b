//! Protocol types shared by the codec and the connection driver.
//!
//! - [`Message`] / [`PayloadItem`] / [`PayloadSize`]: what the request decoder yields
//! - [`RequestHeader`]: a parsed request head with upgrade and keep-alive inspection
//! - [`HttpError`], [`ParseError`], [`SendError`]: the transport error taxonomy
//! - [`RemoteAddr`]: request extension carrying the peer address

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RemoteAddr;
pub use request::RequestHeader;
pub use request::is_websocket_upgrade;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
