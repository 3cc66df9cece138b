//! The request side of a [`Pair`](crate::Pair).

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Instant, SystemTime};

use bytes::Bytes;
use http::{Extensions, Method, Uri, Version};
use serde::de::DeserializeOwned;
use texa_http::protocol::RemoteAddr;

use crate::headers::RequestHeaders;
use crate::pair::PairState;

/// An inbound request.
///
/// `path` starts out as the URI path and is rewritten by routers while they run their
/// nested middleware: a router matching `/api` on `/api/users` leaves `/users` for its
/// children and puts the prefix back when they fall through.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    path: String,
    params: HashMap<String, String>,
    meta: Extensions,
    headers: RequestHeaders,
    remote_addr: Option<SocketAddr>,
    at: SystemTime,
    received: Instant,
    pending_body: Option<Bytes>,
    body: Option<Bytes>,
    state: PairState,
}

impl Request {
    pub(crate) fn new(incoming: http::Request<Bytes>, state: PairState) -> Self {
        let (mut parts, body) = incoming.into_parts();
        let remote_addr = parts.extensions.remove::<RemoteAddr>().map(|RemoteAddr(addr)| addr);
        let path = parts.uri.path().to_string();
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            path,
            params: HashMap::new(),
            meta: parts.extensions,
            headers: RequestHeaders::new(parts.headers),
            remote_addr,
            at: SystemTime::now(),
            received: Instant::now(),
            pending_body: Some(body),
            body: None,
            state,
        }
    }

    /// Loads the body. Later calls return the already loaded body.
    pub fn init(&mut self) -> &Bytes {
        let pending = &mut self.pending_body;
        self.body.get_or_insert_with(|| pending.take().unwrap_or_default())
    }

    pub fn is_initialized(&self) -> bool {
        self.body.is_some()
    }

    /// The loaded body, empty before [`init`](Request::init).
    pub fn body(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(self.body())
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(self.body())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// The part of the path not consumed by enclosing routers.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn original_path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.params
    }

    /// Scratch space for middleware, keyed by type.
    pub fn meta(&self) -> &Extensions {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Extensions {
        &mut self.meta
    }

    pub fn headers(&self) -> &RequestHeaders {
        &self.headers
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.remote_addr.map(|addr| addr.ip())
    }

    /// When the request was accepted.
    pub fn at(&self) -> SystemTime {
        self.at
    }

    pub fn received(&self) -> Instant {
        self.received
    }

    pub fn is_websocket(&self) -> bool {
        self.headers.contains(http::header::SEC_WEBSOCKET_VERSION)
    }

    pub fn is_writable(&self) -> bool {
        self.state.is_writable()
    }

    /// Ends the exchange without a response. The connection is dropped once the current
    /// middleware chain returns.
    pub fn close(&mut self) {
        self.state.begin_ending();
        self.state.finish();
    }
}
