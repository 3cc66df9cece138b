use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use http::HeaderMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio::sync::{Mutex, Notify};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use super::{CloseEvent, Closer, SocketError, SocketEvent, SocketId, SocketRegistry, WeakRegistry};

/// Close code sent when reading from the peer failed.
const ABNORMAL_CLOSE: u16 = 1011;
/// Reported when the transport ended without a close frame.
const NO_CLOSE_FRAME: u16 = 1006;

type BoxSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;
type BoxStream = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;
type Listener = Arc<dyn Fn(WebSocket, SocketEvent) -> Option<BoxFuture<'static, ()>> + Send + Sync>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum SocketState {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

impl SocketState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SocketState::Open,
            1 => SocketState::Closing,
            _ => SocketState::Closed,
        }
    }
}

/// A handle to one websocket connection. Clones refer to the same connection.
#[derive(Clone)]
pub struct WebSocket {
    inner: Arc<Shared>,
}

struct Shared {
    id: SocketId,
    path: String,
    headers: HeaderMap,
    state: AtomicU8,
    sink: Mutex<Option<BoxSink>>,
    listeners: RwLock<Vec<Listener>>,
    registry: WeakRegistry,
    shutdown: Notify,
}

/// Reads frames from a connection and dispatches them to the listeners of its
/// [`WebSocket`]. Ends when the connection is closed.
pub struct EventLoop {
    socket: WebSocket,
    stream: BoxStream,
}

impl WebSocket {
    /// Wraps an established websocket stream and registers it in `registry`.
    ///
    /// `path` and `headers` are those of the upgrade request.
    pub fn from_stream<S>(
        stream: WebSocketStream<S>,
        path: impl Into<String>,
        headers: HeaderMap,
        registry: &SocketRegistry,
    ) -> (WebSocket, EventLoop)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = stream.split();
        let socket = WebSocket {
            inner: Arc::new(Shared {
                id: SocketId::next(),
                path: path.into(),
                headers,
                state: AtomicU8::new(SocketState::Open as u8),
                sink: Mutex::new(Some(Box::pin(sink))),
                listeners: RwLock::new(Vec::new()),
                registry: registry.downgrade(),
                shutdown: Notify::new(),
            }),
        };
        registry.insert(socket.clone());
        info!(socket_id = %socket.id(), path = socket.path(), "websocket opened");

        let event_loop = EventLoop { socket: socket.clone(), stream: Box::pin(stream) };
        (socket, event_loop)
    }

    pub fn id(&self) -> SocketId {
        self.inner.id
    }

    /// Path of the upgrade request.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Headers of the upgrade request.
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    pub fn state(&self) -> SocketState {
        SocketState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == SocketState::Open
    }

    fn swap_state(&self, state: SocketState) -> SocketState {
        SocketState::from_u8(self.inner.state.swap(state as u8, Ordering::AcqRel))
    }

    fn listen<F>(&self, listener: F)
    where
        F: Fn(WebSocket, SocketEvent) -> Option<BoxFuture<'static, ()>> + Send + Sync + 'static,
    {
        self.inner.listeners.write().unwrap_or_else(PoisonError::into_inner).push(Arc::new(listener));
    }

    /// Registers a listener for every event.
    pub fn on_event<F, Fut>(&self, f: F)
    where
        F: Fn(WebSocket, SocketEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listen(move |socket, event| Some(f(socket, event).boxed()));
    }

    pub fn on_message<F, Fut>(&self, f: F)
    where
        F: Fn(WebSocket, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listen(move |socket, event| match event {
            SocketEvent::Message(text) => Some(f(socket, text).boxed()),
            _ => None,
        });
    }

    pub fn on_binary<F, Fut>(&self, f: F)
    where
        F: Fn(WebSocket, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listen(move |socket, event| match event {
            SocketEvent::Binary(data) => Some(f(socket, data).boxed()),
            _ => None,
        });
    }

    pub fn on_ping<F, Fut>(&self, f: F)
    where
        F: Fn(WebSocket, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listen(move |socket, event| match event {
            SocketEvent::Ping(data) => Some(f(socket, data).boxed()),
            _ => None,
        });
    }

    pub fn on_pong<F, Fut>(&self, f: F)
    where
        F: Fn(WebSocket, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listen(move |socket, event| match event {
            SocketEvent::Pong(data) => Some(f(socket, data).boxed()),
            _ => None,
        });
    }

    pub fn on_close<F, Fut>(&self, f: F)
    where
        F: Fn(WebSocket, CloseEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listen(move |socket, event| match event {
            SocketEvent::Close(close) => Some(f(socket, close).boxed()),
            _ => None,
        });
    }

    pub fn on_error<F, Fut>(&self, f: F)
    where
        F: Fn(WebSocket, Arc<SocketError>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listen(move |socket, event| match event {
            SocketEvent::Error(e) => Some(f(socket, e).boxed()),
            _ => None,
        });
    }

    async fn dispatch(&self, event: SocketEvent) {
        let listeners = self.inner.listeners.read().unwrap_or_else(PoisonError::into_inner).clone();
        for listener in listeners {
            if let Some(fut) = listener(self.clone(), event.clone()) {
                fut.await;
            }
        }
    }

    pub async fn send(&self, message: Message) -> Result<(), SocketError> {
        if !self.is_open() {
            return Err(SocketError::Closed);
        }
        let mut sink = self.inner.sink.lock().await;
        let sink = sink.as_mut().ok_or(SocketError::Closed)?;
        sink.send(message).await.map_err(SocketError::transport)
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), SocketError> {
        self.send(Message::text(text.into())).await
    }

    pub async fn send_binary(&self, data: impl Into<Bytes>) -> Result<(), SocketError> {
        self.send(Message::binary(data.into())).await
    }

    pub async fn ping(&self, data: impl Into<Bytes>) -> Result<(), SocketError> {
        self.send(Message::Ping(data.into())).await
    }

    async fn send_close(&self, code: Option<u16>, reason: &str) -> Result<(), SocketError> {
        let frame = code.map(|code| CloseFrame { code: CloseCode::from(code), reason: reason.to_string().into() });
        let mut sink = self.inner.sink.lock().await;
        let sink = sink.as_mut().ok_or(SocketError::Closed)?;
        sink.send(Message::Close(frame)).await.map_err(SocketError::transport)
    }

    /// Starts the close handshake.
    ///
    /// The socket leaves the registry before anything is sent. Listeners see a
    /// [`Closer::Server`] close event; the peer's echo is not reported. Closing a socket
    /// that is not open does nothing.
    pub async fn close(&self, code: Option<u16>, reason: &str) -> Result<(), SocketError> {
        self.inner.registry.remove(&self.id());

        let opened = self
            .inner
            .state
            .compare_exchange(SocketState::Open as u8, SocketState::Closing as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !opened {
            return Ok(());
        }

        debug!(socket_id = %self.id(), ?code, reason, "closing websocket");
        let result = self.send_close(code, reason).await;
        self.dispatch(SocketEvent::Close(CloseEvent { closer: Closer::Server, code, reason: reason.to_string() }))
            .await;
        result
    }

    /// Drops the connection without a close handshake.
    pub async fn close_force(&self) {
        self.inner.registry.remove(&self.id());
        let previous = self.swap_state(SocketState::Closed);
        self.inner.sink.lock().await.take();
        self.inner.shutdown.notify_one();

        if previous != SocketState::Closed {
            debug!(socket_id = %self.id(), "websocket dropped");
            self.dispatch(SocketEvent::Close(CloseEvent { closer: Closer::Server, code: None, reason: String::new() }))
                .await;
        }
    }

    async fn handle(&self, message: Message) {
        let event = match message {
            Message::Text(text) => SocketEvent::Message(text.as_str().to_string()),
            Message::Binary(data) => SocketEvent::Binary(data),
            Message::Ping(data) => SocketEvent::Ping(data),
            Message::Pong(data) => SocketEvent::Pong(data),
            Message::Close(frame) => {
                let (code, reason) = match frame {
                    Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_string()),
                    None => (None, String::new()),
                };
                match self.swap_state(SocketState::Closed) {
                    SocketState::Open => {
                        self.inner.registry.remove(&self.id());
                        info!(socket_id = %self.id(), ?code, "websocket closed by client");
                        SocketEvent::Close(CloseEvent { closer: Closer::Client, code, reason })
                    }
                    _ => return,
                }
            }
            Message::Frame(_) => return,
        };
        self.dispatch(event).await;
    }

    async fn transport_ended(&self) {
        if self.swap_state(SocketState::Closed) == SocketState::Open {
            self.inner.registry.remove(&self.id());
            info!(socket_id = %self.id(), "websocket transport ended without close frame");
            self.dispatch(SocketEvent::Close(CloseEvent {
                closer: Closer::Client,
                code: Some(NO_CLOSE_FRAME),
                reason: String::new(),
            }))
            .await;
        }
    }

    /// Read failures while open close the socket with 1011 and surface as errors. After a
    /// close was started the failure only ends the loop.
    async fn read_failed(&self, e: WsError) {
        self.inner.registry.remove(&self.id());
        if self.swap_state(SocketState::Closed) != SocketState::Open {
            debug!(socket_id = %self.id(), cause = %e, "websocket transport ended while closing");
            return;
        }

        warn!(socket_id = %self.id(), cause = %e, "websocket read failed");
        let close_result = self.send_close(Some(ABNORMAL_CLOSE), "").await;
        self.dispatch(SocketEvent::Error(Arc::new(SocketError::transport(e)))).await;
        if let Err(close_error) = close_result {
            self.dispatch(SocketEvent::Error(Arc::new(close_error))).await;
        }
    }
}

impl EventLoop {
    pub fn socket(&self) -> &WebSocket {
        &self.socket
    }

    pub async fn run(mut self) {
        let socket = self.socket;
        loop {
            let frame = select! {
                biased;

                _ = socket.inner.shutdown.notified() => break,
                frame = self.stream.next() => frame,
            };

            match frame {
                Some(Ok(message)) => socket.handle(message).await,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    socket.transport_ended().await;
                    break;
                }
                Some(Err(e)) => {
                    socket.read_failed(e).await;
                    break;
                }
            }
        }
        debug!(socket_id = %socket.id(), "websocket event loop ended");
    }
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("id", &self.inner.id)
            .field("path", &self.inner.path)
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop").field("socket", &self.socket).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::protocol::Role;

    use super::*;

    async fn open(registry: &SocketRegistry) -> (WebSocket, EventLoop, WebSocketStream<DuplexStream>) {
        let (client_io, server_io) = duplex(4096);
        let (server, client) = tokio::join!(
            WebSocketStream::from_raw_socket(server_io, Role::Server, None),
            WebSocketStream::from_raw_socket(client_io, Role::Client, None),
        );
        let (socket, events) = WebSocket::from_stream(server, "/room", HeaderMap::new(), registry);
        (socket, events, client)
    }

    fn record(socket: &WebSocket) -> mpsc::UnboundedReceiver<SocketEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        socket.on_event(move |_, event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
            }
        });
        rx
    }

    #[tokio::test]
    async fn classifies_frames_and_client_close() {
        let registry = SocketRegistry::new();
        let (socket, events, mut client) = open(&registry).await;
        let mut rx = record(&socket);
        assert!(registry.contains(&socket.id()));
        let handle = tokio::spawn(events.run());

        client.send(Message::text("hello")).await.unwrap();
        client.send(Message::binary(Bytes::from_static(b"\x01\x02"))).await.unwrap();
        client.send(Message::Pong(Bytes::from_static(b"p"))).await.unwrap();
        client.send(Message::Close(Some(CloseFrame { code: CloseCode::Normal, reason: "bye".to_string().into() }))).await.unwrap();

        assert!(matches!(rx.recv().await, Some(SocketEvent::Message(text)) if text == "hello"));
        assert!(matches!(rx.recv().await, Some(SocketEvent::Binary(data)) if data.as_ref() == b"\x01\x02"));
        assert!(matches!(rx.recv().await, Some(SocketEvent::Pong(data)) if data.as_ref() == b"p"));
        match rx.recv().await {
            Some(SocketEvent::Close(close)) => {
                assert_eq!(close, CloseEvent { closer: Closer::Client, code: Some(1000), reason: "bye".to_string() })
            }
            other => panic!("expected close event, got {other:?}"),
        }

        assert!(!registry.contains(&socket.id()));
        assert_eq!(socket.state(), SocketState::Closed);
        drop(client);
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn server_close_unregisters_before_event() {
        let registry = SocketRegistry::new();
        let (socket, events, mut client) = open(&registry).await;
        let mut rx = record(&socket);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let lookup = registry.clone();
        socket.on_close(move |socket, _| {
            let seen_tx = seen_tx.clone();
            let registered = lookup.contains(&socket.id());
            async move {
                let _ = seen_tx.send(registered);
            }
        });
        let handle = tokio::spawn(events.run());

        socket.close(Some(4001), "Name in use").await.unwrap();
        assert_eq!(seen_rx.recv().await, Some(false));
        match rx.recv().await {
            Some(SocketEvent::Close(close)) => {
                assert_eq!(close.closer, Closer::Server);
                assert_eq!(close.code, Some(4001));
                assert_eq!(close.reason, "Name in use");
            }
            other => panic!("expected close event, got {other:?}"),
        }

        match client.next().await {
            Some(Ok(Message::Close(Some(frame)))) => assert_eq!(u16::from(frame.code), 4001),
            other => panic!("expected close frame, got {other:?}"),
        }
        // keep reading so the client flushes its close echo
        while client.next().await.is_some() {}
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

        assert_eq!(socket.state(), SocketState::Closed);
        assert!(registry.is_empty());
        assert!(rx.try_recv().is_err());
        assert!(matches!(socket.send_text("late").await, Err(SocketError::Closed)));
        socket.close(Some(1000), "again").await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn server_messages_reach_client() {
        let registry = SocketRegistry::new();
        let (socket, events, mut client) = open(&registry).await;
        let handle = tokio::spawn(events.run());

        socket.send_text("welcome").await.unwrap();
        socket.ping(Bytes::from_static(b"hb")).await.unwrap();
        assert!(matches!(client.next().await, Some(Ok(Message::Text(text))) if text.as_str() == "welcome"));
        assert!(matches!(client.next().await, Some(Ok(Message::Ping(data))) if data.as_ref() == b"hb"));

        socket.close_force().await;
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn close_force_stops_event_loop() {
        let registry = SocketRegistry::new();
        let (socket, events, _client) = open(&registry).await;
        let mut rx = record(&socket);
        let handle = tokio::spawn(events.run());

        socket.close_force().await;
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

        assert!(registry.is_empty());
        assert!(matches!(
            rx.recv().await,
            Some(SocketEvent::Close(CloseEvent { closer: Closer::Server, code: None, .. }))
        ));
    }

    #[tokio::test]
    async fn read_failure_reports_error() {
        let registry = SocketRegistry::new();
        let (client_io, server_io) = duplex(4096);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let (socket, events) = WebSocket::from_stream(server, "/room", HeaderMap::new(), &registry);
        let mut rx = record(&socket);
        let handle = tokio::spawn(events.run());

        let mut client_io = client_io;
        // FIN with the reserved opcode 0x3
        client_io.write_all(&[0x83, 0x80, 0, 0, 0, 0]).await.unwrap();

        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert!(registry.is_empty());
        assert_eq!(socket.state(), SocketState::Closed);
        assert!(matches!(rx.recv().await, Some(SocketEvent::Error(e)) if matches!(*e, SocketError::Transport { .. })));
    }
}
