use texa::middleware::{BoxError, Next, logger, middleware_fn};
use texa::{Application, Request, Response, Router};

async fn hello_world(_req: &mut Request, res: &mut Response, _next: Next<'_>) -> Result<(), BoxError> {
    res.send("hello world").await?;
    Ok(())
}

async fn not_found(_req: &mut Request, res: &mut Response, _next: Next<'_>) -> Result<(), BoxError> {
    res.status(404u16)?.send("404 not found").await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let router = Router::builder().get("/", [middleware_fn(hello_world)]).build()?;

    Application::builder()
        .address("127.0.0.1:3000")
        .log_level("info")
        .use_middleware(logger())
        .use_middleware(router)
        .use_middleware(middleware_fn(not_found))
        .build()?
        .listen()
        .await?;
    Ok(())
}
