use bytes::Bytes;
use http::Response;
use tokio::sync::oneshot;

use crate::protocol::SendError;

/// Creates a linked [`Responder`] and [`ReplyReceiver`] for one exchange.
pub fn responder() -> (Responder, ReplyReceiver) {
    let (tx, rx) = oneshot::channel();
    (Responder { tx }, ReplyReceiver { rx })
}

/// The sending half of an exchange. Consumed by [`Responder::respond`].
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<Reply>,
}

/// The receiving half of an exchange, held by whoever writes the response.
#[derive(Debug)]
pub struct ReplyReceiver {
    rx: oneshot::Receiver<Reply>,
}

#[derive(Debug)]
pub(crate) struct Reply {
    pub(crate) response: Response<Bytes>,
    pub(crate) written: oneshot::Sender<Result<(), SendError>>,
}

impl Responder {
    /// Hands the response over and waits until it was written or failed to be.
    pub async fn respond(self, response: Response<Bytes>) -> Result<(), SendError> {
        let (written, written_rx) = oneshot::channel();
        self.tx.send(Reply { response, written }).map_err(|_| SendError::Closed)?;
        written_rx.await.map_err(|_| SendError::Closed)?
    }

    /// Returns true when nobody is waiting for a response anymore.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl ReplyReceiver {
    pub(crate) fn into_inner(self) -> oneshot::Receiver<Reply> {
        self.rx
    }

    /// Takes the response without writing it anywhere and reports success to the
    /// [`Responder`]. Returns `None` when the responder was dropped without answering.
    ///
    /// Useful when the exchange is driven by something other than an [`HttpConnection`],
    /// tests in particular.
    ///
    /// [`HttpConnection`]: crate::connection::HttpConnection
    pub async fn accept(self) -> Option<Response<Bytes>> {
        let reply = self.rx.await.ok()?;
        let _ = reply.written.send(Ok(()));
        Some(reply.response)
    }

    /// Like [`accept`](ReplyReceiver::accept) but reports `error` to the responder.
    pub async fn reject(self, error: SendError) -> Option<Response<Bytes>> {
        let reply = self.rx.await.ok()?;
        let _ = reply.written.send(Err(error));
        Some(reply.response)
    }
}
