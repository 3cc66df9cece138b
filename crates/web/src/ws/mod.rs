//! WebSocket connections.
//!
//! After the HTTP upgrade, every connection gets a [`WebSocket`] handle and an
//! [`EventLoop`] that reads frames on the connection's own task. Each frame becomes one
//! [`SocketEvent`] handed to the listeners registered on the handle, in registration order.
//!
//! Closing follows the websocket close handshake. The side that sent the first close
//! frame is reported as the [`Closer`]; the echo of a server initiated close is not
//! reported a second time.

mod id;
mod registry;
mod socket;

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

pub use id::SocketId;
pub use registry::SocketRegistry;
pub use socket::{EventLoop, SocketState, WebSocket};
pub use tungstenite::Message;

pub(crate) use registry::WeakRegistry;

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("The socket is closed!")]
    Closed,

    #[error("websocket transport error: {source}")]
    Transport { source: tungstenite::Error },
}

impl SocketError {
    pub fn transport(source: tungstenite::Error) -> Self {
        Self::Transport { source }
    }
}

/// Which side started the close handshake.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Closer {
    Client,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    pub closer: Closer,
    pub code: Option<u16>,
    pub reason: String,
}

/// One classified inbound frame, or a change of the connection state.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    Message(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(CloseEvent),
    Error(Arc<SocketError>),
}
