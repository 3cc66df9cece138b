//! Codecs for the HTTP/1.1 wire format
//!
//! - [`RequestDecoder`] turns bytes into a request head followed by its body chunks. It
//!   delegates to the header decoder and, once the head announced a `Content-Length`, to
//!   a length-delimited body decoder.
//! - [`ResponseEncoder`] serializes a complete `http::Response<Bytes>` with a fixed
//!   `Content-Length`.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use texa_http::codec::RequestDecoder;
//! use texa_http::protocol::Message;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n");
//! let message = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert!(matches!(message, Message::Header(_)));
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
