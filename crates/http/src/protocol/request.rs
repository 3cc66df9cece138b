//! The request head as produced by the decoder.
//!
//! [`RequestHeader`] wraps `http::Request<()>` and adds the inspections the connection
//! driver needs: whether a body is expected, whether the connection stays open after the
//! exchange, and whether the client asks for a websocket upgrade.

use std::net::SocketAddr;

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version, header};

/// Request extension holding the address of the peer that sent the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body, turning the head into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the method may carry a body. GET, HEAD, DELETE, OPTIONS and CONNECT
    /// requests are treated as bodiless regardless of their headers.
    pub fn need_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }

    /// Whether the connection may be reused after this exchange.
    ///
    /// HTTP/1.1 defaults to persistent connections unless `Connection: close` is sent,
    /// HTTP/1.0 requires an explicit `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        match self.version() {
            Version::HTTP_11 => !has_token(self.headers(), header::CONNECTION, "close"),
            Version::HTTP_10 => has_token(self.headers(), header::CONNECTION, "keep-alive"),
            _ => false,
        }
    }

    /// Whether this is a websocket opening handshake: a GET carrying
    /// `Connection: upgrade`, `Upgrade: websocket` and a `Sec-WebSocket-Key`.
    pub fn is_websocket_upgrade(&self) -> bool {
        is_websocket_upgrade(&self.inner)
    }
}

/// [`RequestHeader::is_websocket_upgrade`] for a request that already carries its body.
pub fn is_websocket_upgrade<T>(request: &Request<T>) -> bool {
    request.method() == Method::GET
        && has_token(request.headers(), header::CONNECTION, "upgrade")
        && has_token(request.headers(), header::UPGRADE, "websocket")
        && request.headers().contains_key(header::SEC_WEBSOCKET_KEY)
}

/// Checks a comma separated header for `token`, ignoring ASCII case.
fn has_token(headers: &HeaderMap, name: header::HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|item| item.trim().eq_ignore_ascii_case(token))
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: Version, headers: &[(&str, &str)]) -> RequestHeader {
        let mut builder = Request::builder().method(Method::GET).uri("/chat").version(version);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into()
    }

    #[test]
    fn keep_alive_defaults() {
        assert!(header(Version::HTTP_11, &[]).keep_alive());
        assert!(!header(Version::HTTP_11, &[("Connection", "close")]).keep_alive());
        assert!(!header(Version::HTTP_10, &[]).keep_alive());
        assert!(header(Version::HTTP_10, &[("Connection", "Keep-Alive")]).keep_alive());
    }

    #[test]
    fn websocket_upgrade() {
        let upgrade = header(
            Version::HTTP_11,
            &[("Connection", "keep-alive, Upgrade"), ("Upgrade", "WebSocket"), ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")],
        );
        assert!(upgrade.is_websocket_upgrade());

        let missing_key = header(Version::HTTP_11, &[("Connection", "Upgrade"), ("Upgrade", "websocket")]);
        assert!(!missing_key.is_websocket_upgrade());

        let plain = header(Version::HTTP_11, &[("Connection", "keep-alive")]);
        assert!(!plain.is_websocket_upgrade());
    }

    #[test]
    fn bodiless_methods() {
        let get: RequestHeader = Request::get("/").body(()).unwrap().into();
        let post: RequestHeader = Request::post("/").body(()).unwrap().into();
        assert!(!get.need_body());
        assert!(post.need_body());
    }
}
