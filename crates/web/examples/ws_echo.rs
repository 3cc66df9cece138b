use texa::middleware::{BoxError, Next, middleware_fn};
use texa::ws::{Closer, WebSocket};
use texa::{Application, Request, Response};
use tracing::{error, info};

async fn hello(_req: &mut Request, res: &mut Response, _next: Next<'_>) -> Result<(), BoxError> {
    res.send("Hello").await?;
    Ok(())
}

async fn on_connection(socket: WebSocket) {
    info!(socket_id = %socket.id(), "connection");

    socket.on_message(|socket, message| async move {
        if let Err(e) = socket.send_text(message).await {
            error!(cause = %e, "can't echo message");
        }
    });

    socket.on_close(|socket, close| async move {
        match close.closer {
            Closer::Client => info!(socket_id = %socket.id(), code = ?close.code, reason = %close.reason, "client has left"),
            Closer::Server => info!(socket_id = %socket.id(), code = ?close.code, reason = %close.reason, "server disconnected client"),
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let address = std::env::args().nth(1).unwrap_or_else(|| "0.0.0.0:4000".to_string());

    Application::builder()
        .address(address)
        .log_level("info")
        .on_connection(on_connection)
        .on_error(|e| error!(cause = %e, "websocket handshake failed"))
        .use_middleware(middleware_fn(hello))
        .build()?
        .listen()
        .await?;
    Ok(())
}
