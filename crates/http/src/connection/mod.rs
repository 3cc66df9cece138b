//! Driving an HTTP/1.1 connection
//!
//! - [`HttpConnection`] reads complete requests, answers `Expect: 100-continue`, writes
//!   responses, tracks keep-alive, and hands the stream back through
//!   [`HttpConnection::into_upgraded`] once a protocol switch was answered.
//! - [`Responder`] / [`ReplyReceiver`] connect the code producing a response with the
//!   connection writing it. A [`Responder`] is consumed by sending, so at most one
//!   response is written per request.

mod http_connection;
mod responder;

pub use http_connection::HttpConnection;
pub use http_connection::Served;
pub use http_connection::Upgraded;
pub use responder::ReplyReceiver;
pub use responder::Responder;
pub use responder::responder;
