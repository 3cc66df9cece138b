//! Routers: nested middleware sequences gated by path patterns.
//!
//! A [`Router`] is an ordered list of entries. Each entry is either a plain addon, run for
//! every request reaching it, or a route: a [`PathPattern`] (and optionally a method) with
//! its own nested sequence. When a route matches, the matched prefix is cut off the
//! request path while the nested sequence runs, and put back if that sequence falls
//! through. A route that doesn't match falls through untouched.
//!
//! ```
//! use texa::Router;
//! use texa::middleware::{BoxError, Next, middleware_fn};
//! use texa::{Request, Response};
//!
//! async fn show_user(req: &mut Request, res: &mut Response, _next: Next<'_>) -> Result<(), BoxError> {
//!     let id = req.param("id").unwrap_or_default().to_string();
//!     res.send(format!("user {id}")).await?;
//!     Ok(())
//! }
//!
//! let users = Router::builder().get("/:id", [middleware_fn(show_user)]).build().unwrap();
//! let api = Router::builder().mount("/users", [users]).build().unwrap();
//! ```

mod pattern;

use std::fmt;

use async_trait::async_trait;
use http::Method;
use tracing::trace;

pub use pattern::{PathMatch, PathPattern};

use crate::error::RouteError;
use crate::middleware::{Addon, BoxError, Middleware, Next, run_middleware};
use crate::{Request, Response};

pub struct Router {
    entries: Vec<Addon>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the entries, then continues the outer chain only if they all continued.
    /// A failure inside is passed on to the outer chain.
    pub(crate) async fn run(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
        let diagnostics = run_middleware(&self.entries, req, res).await;
        let proceed = diagnostics.continued();
        diagnostics.into_result()?;
        next.call(req, res, proceed).await
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("entries", &self.entries).finish()
    }
}

/// A path gated nested sequence.
struct Route {
    pattern: PathPattern,
    method: Option<Method>,
    chain: Vec<Addon>,
}

impl Route {
    fn accepts(&self, method: &Method) -> bool {
        self.method.as_ref().is_none_or(|expected| expected.as_str().eq_ignore_ascii_case(method.as_str()))
    }
}

#[async_trait]
impl Middleware for Route {
    async fn run(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
        if !self.accepts(req.method()) {
            return next.proceed(req, res).await;
        }
        let Some(matched) = self.pattern.matches(req.path()) else {
            return next.proceed(req, res).await;
        };

        let (prefix, rest) = req.path().split_at(matched.len);
        let (prefix, rest) = (prefix.to_string(), rest.to_string());
        trace!(pattern = self.pattern.as_str(), %prefix, %rest, "route matched");

        req.set_path(rest);
        req.params_mut().extend(matched.params);

        let diagnostics = run_middleware(&self.chain, req, res).await;
        let proceed = diagnostics.continued();
        diagnostics.into_result()?;

        if proceed {
            let restored = format!("{prefix}{}", req.path());
            req.set_path(restored);
        }
        next.call(req, res, proceed).await
    }
}

#[derive(Debug)]
enum Pending {
    Addon(Addon),
    Route { path: String, end: bool, method: Option<Method>, chain: Vec<Addon> },
}

/// Collects router entries. Patterns are compiled by [`RouterBuilder::build`].
#[derive(Debug)]
pub struct RouterBuilder {
    pending: Vec<Pending>,
}

macro_rules! method_route {
    ($method:ident, $upper_case_method:ident) => {
        #[doc = concat!("Runs `addons` for ", stringify!($upper_case_method), " requests whose whole remaining path matches `path`.")]
        pub fn $method<A: Into<Addon>>(self, path: impl Into<String>, addons: impl IntoIterator<Item = A>) -> Self {
            self.route(path.into(), true, Some(Method::$upper_case_method), addons)
        }
    };
}

impl RouterBuilder {
    fn new() -> Self {
        Self { pending: Vec::new() }
    }

    /// Runs `addon` for every request reaching this entry.
    pub fn use_middleware(mut self, addon: impl Into<Addon>) -> Self {
        self.pending.push(Pending::Addon(addon.into()));
        self
    }

    /// Runs `addons` for requests whose path starts with `path`.
    pub fn mount<A: Into<Addon>>(self, path: impl Into<String>, addons: impl IntoIterator<Item = A>) -> Self {
        self.route(path.into(), false, None, addons)
    }

    /// Runs `addons` for requests of any method whose whole remaining path matches `path`.
    pub fn all<A: Into<Addon>>(self, path: impl Into<String>, addons: impl IntoIterator<Item = A>) -> Self {
        self.route(path.into(), true, None, addons)
    }

    method_route!(get, GET);
    method_route!(post, POST);
    method_route!(put, PUT);
    method_route!(patch, PATCH);
    method_route!(delete, DELETE);
    method_route!(head, HEAD);
    method_route!(options, OPTIONS);

    fn route<A: Into<Addon>>(mut self, path: String, end: bool, method: Option<Method>, addons: impl IntoIterator<Item = A>) -> Self {
        let chain = addons.into_iter().map(Into::into).collect();
        self.pending.push(Pending::Route { path, end, method, chain });
        self
    }

    pub fn build(self) -> Result<Router, RouteError> {
        let entries = self
            .pending
            .into_iter()
            .map(|pending| match pending {
                Pending::Addon(addon) => Ok(addon),
                Pending::Route { path, end, method, chain } => {
                    let pattern = PathPattern::new(&path, end)?;
                    Ok(Addon::from(Route { pattern, method, chain }))
                }
            })
            .collect::<Result<Vec<_>, RouteError>>()?;

        Ok(Router { entries })
    }
}
