//! Middleware: the unit of work in a request pipeline.
//!
//! A middleware receives the request, the response and a [`Next`] continuation. It can
//! run the rest of the chain with [`Next::proceed`], stop it with [`Next::halt`], or fail by
//! returning an error. Returning without touching `next` counts as a halt.
//!
//! Pipelines are sequences of [`Addon`]s: plain middleware, or a nested [`Router`] with a
//! sequence of its own.
//!
//! # Example
//!
//! ```
//! use texa::middleware::{BoxError, Next, middleware_fn};
//! use texa::{Request, Response};
//!
//! async fn hello(_req: &mut Request, res: &mut Response, _next: Next<'_>) -> Result<(), BoxError> {
//!     res.send("Hello World!").await?;
//!     Ok(())
//! }
//!
//! let addon = middleware_fn(hello);
//! ```

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::trace;

use crate::router::Router;
use crate::{Request, Response};

mod logger;
mod runner;
mod static_files;

pub use logger::{Logger, logger};
pub use runner::{Diagnostics, run_middleware};
pub use static_files::{FileHandler, HandlerFn, Static, handler_fn};

pub(crate) use runner::RunState;

pub type BoxError = Box<dyn Error + Send + Sync>;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn run(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError>;
}

/// One step of a pipeline.
#[derive(Clone)]
pub enum Addon {
    Unit(Arc<dyn Middleware>),
    Router(Arc<Router>),
}

impl Addon {
    pub(crate) async fn run(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
        match self {
            Addon::Unit(middleware) => middleware.run(req, res, next).await,
            Addon::Router(router) => router.run(req, res, next).await,
        }
    }
}

impl fmt::Debug for Addon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Addon::Unit(_) => f.write_str("Addon::Unit"),
            Addon::Router(router) => f.debug_tuple("Addon::Router").field(router).finish(),
        }
    }
}

impl<M: Middleware + 'static> From<M> for Addon {
    fn from(middleware: M) -> Self {
        Addon::Unit(Arc::new(middleware))
    }
}

impl From<Router> for Addon {
    fn from(router: Router) -> Self {
        Addon::Router(Arc::new(router))
    }
}

impl From<Arc<Router>> for Addon {
    fn from(router: Arc<Router>) -> Self {
        Addon::Router(router)
    }
}

/// The continuation handed to a middleware. Consumed by use, so it runs at most once.
pub struct Next<'a> {
    chain: &'a [Addon],
    index: usize,
    state: &'a RunState,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Addon], state: &'a RunState) -> Self {
        Self { chain, index: 0, state }
    }

    /// Runs the rest of the chain.
    pub async fn proceed(self, req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
        self.call(req, res, true).await
    }

    /// Stops the chain here.
    pub fn halt(self) {
        self.state.mark_invoked(self.index);
    }

    /// Runs the rest of the chain if `proceed` is true, otherwise stops it.
    pub fn call<'r>(self, req: &'r mut Request, res: &'r mut Response, proceed: bool) -> BoxFuture<'r, Result<(), BoxError>>
    where
        'a: 'r,
    {
        Box::pin(async move {
            self.state.mark_invoked(self.index);
            if !proceed {
                return Ok(());
            }

            let Some(addon) = self.chain.get(self.index) else {
                self.state.reach_boundary();
                return Ok(());
            };

            self.state.record_ran();
            let next = Next { chain: self.chain, index: self.index + 1, state: self.state };
            addon.run(req, res, next).await?;

            if !self.state.is_invoked(self.index + 1) {
                trace!(position = self.index, "middleware returned without calling next");
                self.state.mark_invoked(self.index + 1);
            }
            Ok(())
        })
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("index", &self.index).field("len", &self.chain.len()).finish()
    }
}

/// Adapts an `async fn(&mut Request, &mut Response, Next<'_>) -> Result<(), BoxError>`
/// into a [`Middleware`].
pub trait MiddlewareFn<'a>: Send + Sync {
    type Future: Future<Output = Result<(), BoxError>> + Send + 'a;

    fn call(&self, req: &'a mut Request, res: &'a mut Response, next: Next<'a>) -> Self::Future;
}

impl<'a, F, Fut> MiddlewareFn<'a> for F
where
    F: Fn(&'a mut Request, &'a mut Response, Next<'a>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'a,
{
    type Future = Fut;

    fn call(&self, req: &'a mut Request, res: &'a mut Response, next: Next<'a>) -> Self::Future {
        (self)(req, res, next)
    }
}

pub struct FnMiddleware<F> {
    f: F,
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnMiddleware")
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> MiddlewareFn<'a>,
{
    async fn run(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
        self.f.call(req, res, next).await
    }
}

pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> MiddlewareFn<'a>,
{
    FnMiddleware { f }
}
