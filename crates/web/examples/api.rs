//! A JSON echo endpoint with websockets turned off.
//!
//! curl -v -H 'Content-Type: application/json' -d '{"name":"texa"}' http://127.0.0.1:4000/

use serde_json::Value;
use texa::middleware::{BoxError, Next, logger, middleware_fn};
use texa::{Application, Request, Response, Router};
use tracing::info;

async fn echo(req: &mut Request, res: &mut Response, _next: Next<'_>) -> Result<(), BoxError> {
    let body: Value = req.json()?;
    info!(%body, "receive json");
    res.json(&body).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let address = std::env::args().nth(1).unwrap_or_else(|| "0.0.0.0:4000".to_string());
    let router = Router::builder().post("/", [middleware_fn(echo)]).build()?;

    Application::builder()
        .address(address)
        .allow_websocket(false)
        .log_level("info")
        .use_middleware(logger())
        .use_middleware(router)
        .build()?
        .listen()
        .await?;
    Ok(())
}
