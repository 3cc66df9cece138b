//! The connection dispatcher.
//!
//! An [`Application`] accepts connections and reads requests off them. A websocket
//! upgrade request hands the connection over to a [`WebSocket`]; every other request
//! becomes a [`Pair`] that runs through the application's middleware. Whatever the
//! middleware leaves unanswered is finalized afterwards, so every plain request gets
//! exactly one response.

use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use http::header::{CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, UPGRADE};
use http::{HeaderValue, StatusCode};
use texa_http::addr::{Address, parse_addr};
use texa_http::connection::{HttpConnection, Served, Upgraded, responder};
use texa_http::protocol::{HttpError, ParseError, is_websocket_upgrade};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tracing::{Level, debug, error, info, trace, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::error::BuildError;
use crate::file::{FileResolver, FsResolver};
use crate::middleware::{Addon, BoxError, run_middleware};
use crate::ws::{SocketRegistry, WebSocket};
use crate::{Pair, Request, Response};

const SOCKETS_DISABLED: &str = "WebSocket connections are disabled!";

type ConnectionHandler = Arc<dyn Fn(WebSocket) -> BoxFuture<'static, ()> + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(BoxError) + Send + Sync>;

/// Called when the middleware of a request failed.
#[async_trait]
pub trait RequestErrorHandler: Send + Sync {
    async fn handle(&self, req: &mut Request, res: &mut Response, error: BoxError);
}

/// Logs the failure and answers `500` if nothing was sent yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRequestError;

#[async_trait]
impl RequestErrorHandler for LogRequestError {
    async fn handle(&self, req: &mut Request, res: &mut Response, error: BoxError) {
        error!(cause = %error, method = %req.method(), path = req.original_path(), "request failed");
        if res.is_writable() {
            let _ = res.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

pub struct ApplicationBuilder {
    config: Config,
    middleware: Vec<Addon>,
    registry: Option<SocketRegistry>,
    resolver: Option<Arc<dyn FileResolver>>,
    on_connection: Option<ConnectionHandler>,
    on_error: Option<ErrorHandler>,
    on_request_error: Option<Arc<dyn RequestErrorHandler>>,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self {
            config: Config::default(),
            middleware: Vec::new(),
            registry: None,
            resolver: None,
            on_connection: None,
            on_error: None,
            on_request_error: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    pub fn allow_websocket(mut self, allow: bool) -> Self {
        self.config.allow_websocket = allow;
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.config.max_body_size = max_body_size;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = Some(level.into());
        self
    }

    /// Appends to the root middleware sequence.
    pub fn use_middleware(mut self, addon: impl Into<Addon>) -> Self {
        self.middleware.push(addon.into());
        self
    }

    /// Shares a socket registry with the application, for code that needs to reach
    /// connected sockets from outside their listeners.
    pub fn registry(mut self, registry: SocketRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn resolver(mut self, resolver: impl FileResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Called for every accepted websocket, before its first frame is read.
    pub fn on_connection<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(WebSocket) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_connection = Some(Arc::new(move |socket| f(socket).boxed()));
        self
    }

    /// Called when a websocket handshake could not be completed.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(BoxError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_request_error(mut self, handler: impl RequestErrorHandler + 'static) -> Self {
        self.on_request_error = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<Application, BuildError> {
        let address = parse_addr(&self.config.address)
            .map_err(|e| BuildError::InvalidAddress { address: e.address, reason: e.reason })?;
        let log_level = match &self.config.log_level {
            Some(level) => {
                Some(Level::from_str(level).map_err(|_| BuildError::InvalidLogLevel { level: level.clone() })?)
            }
            None => None,
        };

        Ok(Application {
            address,
            log_level,
            config: self.config,
            middleware: self.middleware.into(),
            registry: self.registry.unwrap_or_default(),
            resolver: self.resolver.unwrap_or_else(|| Arc::new(FsResolver)),
            on_connection: self.on_connection,
            on_error: self.on_error,
            on_request_error: self.on_request_error.unwrap_or_else(|| Arc::new(LogRequestError)),
        })
    }
}

pub struct Application {
    address: Address,
    log_level: Option<Level>,
    config: Config,
    middleware: Arc<[Addon]>,
    registry: SocketRegistry,
    resolver: Arc<dyn FileResolver>,
    on_connection: Option<ConnectionHandler>,
    on_error: Option<ErrorHandler>,
    on_request_error: Arc<dyn RequestErrorHandler>,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The sockets currently open on this application.
    pub fn registry(&self) -> &SocketRegistry {
        &self.registry
    }

    /// Binds the configured address and serves connections until the process ends.
    pub async fn listen(self) -> io::Result<()> {
        if let Some(level) = self.log_level {
            let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
            if tracing::subscriber::set_global_default(subscriber).is_err() {
                debug!("a global tracing subscriber is already installed");
            }
        }

        let listener = TcpListener::bind((self.address.hostname.as_str(), self.address.port)).await.inspect_err(|e| {
            error!(cause = %e, address = %self.address, "bind server error");
        })?;
        self.serve(listener).await
    }

    /// Serves connections accepted by `listener`.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        info!(address = %listener.local_addr()?, "start listening");
        let app = Arc::new(self);
        loop {
            let (tcp_stream, remote_addr) = match listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let app = app.clone();
            tokio::spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                app.serve_connection(reader, writer, Some(remote_addr)).await;
                debug!(%remote_addr, "connection shutdown");
            });
        }
    }

    /// Serves one connection until the peer leaves, an error ends it, or it was upgraded
    /// and the websocket closed.
    pub async fn serve_connection<R, W>(&self, reader: R, writer: W, remote_addr: Option<SocketAddr>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut connection = HttpConnection::new(reader, writer).with_max_body_size(self.config.max_body_size);
        if let Some(remote_addr) = remote_addr {
            connection = connection.with_remote_addr(remote_addr);
        }

        loop {
            let request = match connection.next_request().await {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(e) => {
                    self.reject(&mut connection, e).await;
                    break;
                }
            };

            if is_websocket_upgrade(&request) {
                self.upgrade(connection, request).await;
                return;
            }

            let (responder, receiver) = responder();
            let pair = Pair::new(request, responder, self.resolver.clone());
            match connection.serve(self.exchange(pair), receiver).await {
                Ok(Served::Responded) => {}
                Ok(Served::Dropped) => {
                    debug!("request closed without a response, dropping connection");
                    break;
                }
                Err(e) => {
                    error!(cause = %e, "can't send response, dropping connection");
                    break;
                }
            }

            if !(self.config.keep_alive && connection.keep_alive()) {
                break;
            }
        }
    }

    async fn reject<R, W>(&self, connection: &mut HttpConnection<R, W>, e: ParseError)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if e.is_io() {
            debug!(cause = %e, "connection lost while reading request");
            return;
        }
        warn!(cause = %e, "can't read request");
        if let Err(e) = connection.reject(&e).await {
            debug!(cause = %HttpError::from(e), "can't send rejection");
        }
    }

    /// Runs the middleware for one plain request. The pair is dropped at the end, which
    /// releases a responder that was never used.
    async fn exchange(&self, mut pair: Pair) {
        pair.request.init();
        let diagnostics = run_middleware(&self.middleware, &mut pair.request, &mut pair.response).await;
        trace!(?diagnostics, "middleware finished");

        if let Err(e) = diagnostics.into_result() {
            self.on_request_error.handle(&mut pair.request, &mut pair.response, e).await;
        }

        if pair.is_writable()
            && let Err(e) = pair.response.end().await
        {
            warn!(cause = %e, "can't finalize response");
        }
    }

    async fn upgrade<R, W>(&self, mut connection: HttpConnection<R, W>, request: http::Request<Bytes>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let accept = request
            .headers()
            .get(SEC_WEBSOCKET_KEY)
            .and_then(|key| HeaderValue::from_str(&derive_accept_key(key.as_bytes())).ok());
        let Some(accept) = accept else {
            self.report(BoxError::from("missing websocket key"));
            self.reject(&mut connection, ParseError::invalid_header("missing websocket key")).await;
            return;
        };

        let mut response = http::Response::new(Bytes::new());
        *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
        response.headers_mut().insert(UPGRADE, HeaderValue::from_static("websocket"));
        response.headers_mut().insert(CONNECTION, HeaderValue::from_static("Upgrade"));
        response.headers_mut().insert(SEC_WEBSOCKET_ACCEPT, accept);
        if let Err(e) = connection.send_response(response).await {
            warn!(cause = %e, "can't complete websocket handshake");
            self.report(e.into());
            return;
        }

        let Upgraded { io, read_buf } = connection.into_upgraded();
        let stream = WebSocketStream::from_partially_read(io, read_buf.to_vec(), Role::Server, None).await;
        let (parts, _) = request.into_parts();
        let (socket, events) = WebSocket::from_stream(stream, parts.uri.path(), parts.headers, &self.registry);

        if !self.config.allow_websocket {
            if let Err(e) = socket.close(Some(1000), SOCKETS_DISABLED).await {
                debug!(cause = %e, socket_id = %socket.id(), "can't close refused websocket");
            }
        } else if let Some(on_connection) = &self.on_connection {
            on_connection(socket.clone()).await;
        }

        events.run().await;
    }

    fn report(&self, e: BoxError) {
        if let Some(on_error) = &self.on_error {
            on_error(e);
        }
    }
}

impl std::fmt::Debug for ApplicationBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationBuilder").field("config", &self.config).field("middleware", &self.middleware).finish()
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("address", &self.address)
            .field("config", &self.config)
            .field("middleware", &self.middleware)
            .field("sockets", &self.registry.len())
            .finish()
    }
}
