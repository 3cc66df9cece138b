//! An async web framework built around a middleware chain.
//!
//! Every plain request becomes a [`Pair`]: a [`Request`] and a [`Response`] sharing a
//! write-once lifecycle. The pair runs through the application's middleware in order;
//! each step decides to continue, to stop, or fails. [`Router`]s nest their own
//! sequences behind path patterns, consuming the matched part of the path while their
//! children run. Websocket upgrades are handed to [`ws::WebSocket`] connections with
//! their own event loop.
//!
//! # Example
//!
//! ```no_run
//! use texa::middleware::{BoxError, Next, logger, middleware_fn};
//! use texa::{Application, Request, Response, Router};
//!
//! async fn hello(_req: &mut Request, res: &mut Response, _next: Next<'_>) -> Result<(), BoxError> {
//!     res.send("Hello World!").await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::builder().get("/hello", [middleware_fn(hello)]).build()?;
//!     let app = Application::builder()
//!         .address(":8080")
//!         .log_level("info")
//!         .use_middleware(logger())
//!         .use_middleware(router)
//!         .build()?;
//!     app.listen().await?;
//!     Ok(())
//! }
//! ```

mod application;
mod config;
mod date;
mod error;
mod file;
mod pair;
mod request;
mod response;

pub mod headers;
pub mod middleware;
pub mod router;
pub mod ws;

#[cfg(test)]
mod test_support;

pub use application::{Application, ApplicationBuilder, LogRequestError, RequestErrorHandler};
pub use config::Config;
pub use error::{BuildError, ResponseError, RouteError};
pub use file::{FileResolver, FsResolver, ResolvedFile, mime_for_path};
pub use middleware::{Addon, BoxError, Diagnostics, Middleware, Next, middleware_fn, run_middleware};
pub use pair::{Lifecycle, Pair, PairState};
pub use request::Request;
pub use response::Response;
pub use router::{Router, RouterBuilder};
