use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use http::header::{CONNECTION, EXPECT};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, Join};
use tokio::select;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::connection::ReplyReceiver;
use crate::ensure;
use crate::protocol::{Message, ParseError, PayloadItem, RemoteAddr, RequestHeader, SendError};

const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// One HTTP/1.1 connection, split in a reading and a writing half.
///
/// Requests are read whole: [`next_request`](HttpConnection::next_request) returns once the
/// head and the complete body arrived. The exchange that produces the answer is driven by
/// [`serve`](HttpConnection::serve), which writes whatever response the exchange hands to
/// its [`Responder`](crate::connection::Responder).
///
/// # Type Parameters
///
/// * `R`: The async readable half
/// * `W`: The async writable half
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    remote_addr: Option<SocketAddr>,
    max_body_size: usize,
    keep_alive: bool,
}

/// How an exchange driven by [`HttpConnection::serve`] ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Served {
    /// A response was written
    Responded,
    /// The exchange finished without handing over a response
    Dropped,
}

/// The raw stream of a connection after a protocol switch, plus any bytes the client
/// already sent past the request head.
#[derive(Debug)]
pub struct Upgraded<R, W> {
    pub io: Join<R, W>,
    pub read_buf: BytesMut,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), 8 * 1024),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            remote_addr: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            keep_alive: false,
        }
    }

    pub fn with_remote_addr(mut self, remote_addr: SocketAddr) -> Self {
        self.remote_addr = Some(remote_addr);
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Whether the last request read allows another one on this connection.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Reads the next request, body included.
    ///
    /// Returns `Ok(None)` when the peer closed the connection between requests. After an
    /// error the stream position is unknown, callers should answer with
    /// [`reject`](HttpConnection::reject) and drop the connection.
    pub async fn next_request(&mut self) -> Result<Option<Request<Bytes>>, ParseError> {
        let (header, payload_size) = match self.framed_read.next().await {
            Some(Ok(Message::Header(head))) => head,
            Some(Ok(Message::Payload(_))) => return Err(ParseError::invalid_body("need header while receive body")),
            Some(Err(e)) => return Err(e),
            None => {
                debug!("can't read more request, peer closed the connection");
                return Ok(None);
            }
        };

        let body_size = usize::try_from(payload_size.len()).unwrap_or(usize::MAX);
        ensure!(body_size <= self.max_body_size, ParseError::too_large_body(body_size, self.max_body_size));

        self.send_continue(&header).await?;

        let mut body = BytesMut::with_capacity(body_size);
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => body.extend_from_slice(&bytes),
                Some(Ok(Message::Payload(PayloadItem::Eof))) => break,
                Some(Ok(Message::Header(_))) => return Err(ParseError::invalid_body("receive header while reading body")),
                Some(Err(e)) => return Err(e),
                None => return Err(ParseError::invalid_body("connection closed before the body was complete")),
            }
        }

        self.keep_alive = header.keep_alive();
        self.framed_write.encoder_mut().omit_body(header.method() == Method::HEAD);

        let mut request = header.body(body.freeze());
        if let Some(remote_addr) = self.remote_addr {
            request.extensions_mut().insert(RemoteAddr(remote_addr));
        }
        Ok(Some(request))
    }

    async fn send_continue(&mut self, header: &RequestHeader) -> Result<(), ParseError> {
        let Some(value) = header.headers().get(EXPECT) else {
            return Ok(());
        };

        if value.as_bytes().eq_ignore_ascii_case(b"100-continue") {
            let writer = self.framed_write.get_mut();
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
            writer.flush().await?;
            info!("receive expect request header, sent continue response");
        }
        Ok(())
    }

    /// Drives `exchange` to completion and writes the response it hands over.
    ///
    /// The exchange keeps running after its response was written, so work done after
    /// answering still finishes before the next request is read. The outcome of the write
    /// is reported back to the responder.
    pub async fn serve<F>(&mut self, exchange: F, receiver: ReplyReceiver) -> Result<Served, SendError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(exchange);
        let mut reply_rx = receiver.into_inner();

        let mut exchange_done = false;
        let mut served = None;
        let mut send_error = None;

        while !exchange_done || served.is_none() {
            select! {
                biased;

                reply = &mut reply_rx, if served.is_none() => match reply {
                    Ok(reply) => {
                        let result = self.send_response(reply.response).await;
                        let status = match &result {
                            Ok(()) => Ok(()),
                            Err(e) => {
                                error!(cause = %e, "can't write response");
                                Err(SendError::Closed)
                            }
                        };
                        let _ = reply.written.send(status);
                        send_error = result.err();
                        served = Some(Served::Responded);
                    }
                    Err(_) => served = Some(Served::Dropped),
                },

                _ = &mut exchange, if !exchange_done => {
                    exchange_done = true;
                }
            }
        }

        match (send_error, served) {
            (Some(e), _) => Err(e),
            (None, Some(served)) => Ok(served),
            (None, None) => Ok(Served::Dropped),
        }
    }

    /// Writes and flushes one response.
    pub async fn send_response(&mut self, response: Response<Bytes>) -> Result<(), SendError> {
        self.framed_write.send(response).await
    }

    /// Answers a request that could not be read with an empty error response and marks
    /// the connection as not reusable.
    pub async fn reject(&mut self, error: &ParseError) -> Result<(), SendError> {
        self.keep_alive = false;
        self.framed_write.encoder_mut().omit_body(false);
        self.send_response(build_error_response(error.status_code())).await
    }

    /// Gives up HTTP on this connection and returns the raw stream.
    ///
    /// Call this after the `101 Switching Protocols` response was sent.
    pub fn into_upgraded(self) -> Upgraded<R, W> {
        let parts = self.framed_read.into_parts();
        let writer = self.framed_write.into_inner();
        Upgraded { io: tokio::io::join(parts.io, writer), read_buf: parts.read_buf }
    }
}

fn build_error_response(status_code: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status_code;
    response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::responder;
    use indoc::indoc;
    use tokio::io::{AsyncReadExt, DuplexStream, ReadHalf, WriteHalf, duplex, split};

    type TestConnection = HttpConnection<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

    fn connection() -> (TestConnection, DuplexStream) {
        let (server, client) = duplex(64 * 1024);
        let (reader, writer) = split(server);
        (HttpConnection::new(reader, writer), client)
    }

    async fn read_available(client: &mut DuplexStream) -> String {
        let mut buf = vec![0u8; 4096];
        let n = client.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[tokio::test]
    async fn reads_request_with_body() {
        let (mut connection, mut client) = connection();
        let raw = indoc! {r##"
        POST /users?active=yes HTTP/1.1
        Host: localhost
        Content-Length: 13

        {"id": "ada"}"##};
        client.write_all(raw.as_bytes()).await.unwrap();

        let request = connection.next_request().await.unwrap().unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.uri().query(), Some("active=yes"));
        assert_eq!(request.body().as_ref(), br#"{"id": "ada"}"#);
        assert!(connection.keep_alive());
    }

    #[tokio::test]
    async fn closed_peer_ends_requests() {
        let (mut connection, client) = connection();
        drop(client);

        assert!(connection.next_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_large_body() {
        let (connection, mut client) = connection();
        let mut connection = connection.with_max_body_size(4);
        client.write_all(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello").await.unwrap();

        let error = connection.next_request().await.unwrap_err();
        assert!(matches!(error, ParseError::TooLargeBody { .. }));

        connection.reject(&error).await.unwrap();
        let response = read_available(&mut client).await;
        assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        assert!(!connection.keep_alive());
    }

    #[tokio::test]
    async fn answers_expect_continue() {
        let (mut connection, mut client) = connection();
        client.write_all(b"PUT /file HTTP/1.1\r\nContent-Length: 2\r\nExpect: 100-continue\r\n\r\n").await.unwrap();

        let (request, continue_line) = tokio::join!(connection.next_request(), async {
            let line = read_available(&mut client).await;
            client.write_all(b"ok").await.unwrap();
            line
        });

        assert_eq!(continue_line, "HTTP/1.1 100 Continue\r\n\r\n");
        assert_eq!(request.unwrap().unwrap().body().as_ref(), b"ok");
    }

    #[tokio::test]
    async fn serve_writes_response() {
        let (mut connection, mut client) = connection();
        client.write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        let _request = connection.next_request().await.unwrap().unwrap();

        let (responder, receiver) = responder();
        let exchange = async move {
            let response = Response::new(Bytes::from_static(b"Hello World!"));
            responder.respond(response).await.unwrap();
        };

        let served = connection.serve(exchange, receiver).await.unwrap();
        assert_eq!(served, Served::Responded);

        let response = read_available(&mut client).await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nHello World!"));
    }

    #[tokio::test]
    async fn serve_without_response() {
        let (mut connection, _client) = connection();
        let (responder, receiver) = responder();

        let served = connection.serve(async move { drop(responder) }, receiver).await.unwrap();
        assert_eq!(served, Served::Dropped);
    }

    #[tokio::test]
    async fn upgrade_keeps_buffered_bytes() {
        let (mut connection, mut client) = connection();
        let raw = "GET /chat HTTP/1.1\r\nConnection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\nearly";
        client.write_all(raw.as_bytes()).await.unwrap();

        let request = connection.next_request().await.unwrap().unwrap();
        assert_eq!(request.uri().path(), "/chat");

        let upgraded = connection.into_upgraded();
        assert_eq!(&upgraded.read_buf[..], b"early");
    }
}
