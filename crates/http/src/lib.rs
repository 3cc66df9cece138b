//! The transport layer of texa
//!
//! This crate owns everything that touches bytes on the wire so that the `texa` crate can
//! stay focused on middleware, routing and the request/response lifecycle. It provides:
//!
//! - an HTTP/1.1 request decoder and response encoder built on `tokio_util::codec`
//! - [`connection::HttpConnection`], which reads whole requests from a stream, writes
//!   responses back, and hands the raw stream over when a protocol upgrade is accepted
//! - [`connection::Responder`], a one-shot handle through which exactly one response is
//!   delivered for every request
//! - [`addr::parse_addr`], the `[host]:port` / `:port` address parser used by bootstrap code
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Response, StatusCode};
//! use texa_http::connection::{HttpConnection, responder};
//! use tokio::net::TcpListener;
//! use tracing::{error, info};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     loop {
//!         let (stream, remote_addr) = listener.accept().await.unwrap();
//!         tokio::spawn(async move {
//!             let (reader, writer) = stream.into_split();
//!             let mut connection = HttpConnection::new(reader, writer).with_remote_addr(remote_addr);
//!             while let Ok(Some(request)) = connection.next_request().await {
//!                 info!(path = request.uri().path(), "receive request");
//!                 let (responder, receiver) = responder();
//!                 let exchange = async move {
//!                     let response = Response::builder()
//!                         .status(StatusCode::OK)
//!                         .body(Bytes::from_static(b"Hello World!\r\n"))
//!                         .unwrap();
//!                     if let Err(e) = responder.respond(response).await {
//!                         error!(cause = %e, "send response error");
//!                     }
//!                 };
//!                 if connection.serve(exchange, receiver).await.is_err() {
//!                     break;
//!                 }
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - request bodies must be delimited by `Content-Length`; chunked transfer encoding is rejected
//! - responses are always sent with a fixed `Content-Length`
//! - no TLS (use a reverse proxy for HTTPS)
//! - maximum header size: 8KB, maximum number of headers: 64

pub mod addr;
pub mod codec;
pub mod connection;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
