//! The response side of a [`Pair`](crate::Pair).
//!
//! Every mutator checks the pair's lifecycle first and fails with
//! [`ResponseError::NotWritable`] once [`Response::end`] has started. The body is either an
//! accumulated buffer or a deferred file, whichever was set last; the file is only read
//! when the response is finalized.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, DATE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use mime::Mime;
use serde::Serialize;
use texa_http::connection::Responder;
use texa_http::protocol::SendError;
use tracing::warn;

use crate::date::http_date;
use crate::error::ResponseError;
use crate::file::FileResolver;
use crate::pair::PairState;

const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");
const POWERED_BY_TEXA: HeaderValue = HeaderValue::from_static("Texa");

pub struct Response {
    state: PairState,
    status: StatusCode,
    headers: HeaderMap,
    body: Option<BytesMut>,
    file: Option<PathBuf>,
    responder: Option<Responder>,
    resolver: Arc<dyn FileResolver>,
}

macro_rules! ensure_writable {
    ($self:ident) => {
        if !$self.state.is_writable() {
            return Err(ResponseError::NotWritable);
        }
    };
}

impl Response {
    pub(crate) fn new(state: PairState, responder: Responder, resolver: Arc<dyn FileResolver>) -> Self {
        Self {
            state,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            file: None,
            responder: Some(responder),
            resolver,
        }
    }

    pub(crate) fn state(&self) -> &PairState {
        &self.state
    }

    pub fn is_writable(&self) -> bool {
        self.state.is_writable()
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> Result<(), ResponseError> {
        ensure_writable!(self);
        self.status = status;
        Ok(())
    }

    /// Sets the status code, accepting anything `StatusCode` converts from (`404u16`,
    /// `StatusCode::NOT_FOUND`).
    pub fn status<S>(&mut self, status: S) -> Result<&mut Self, ResponseError>
    where
        StatusCode: TryFrom<S>,
        <StatusCode as TryFrom<S>>::Error: Into<http::Error>,
    {
        ensure_writable!(self);
        self.status = StatusCode::try_from(status).map_err(ResponseError::invalid_status)?;
        Ok(self)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// Replaces every value of `name` with `value`.
    pub fn set_header<K, V>(&mut self, name: K, value: V) -> Result<&mut Self, ResponseError>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        ensure_writable!(self);
        let name = HeaderName::try_from(name).map_err(ResponseError::invalid_header)?;
        let value = HeaderValue::try_from(value).map_err(ResponseError::invalid_header)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a value to `name`, keeping the existing ones.
    pub fn append_header<K, V>(&mut self, name: K, value: V) -> Result<&mut Self, ResponseError>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        ensure_writable!(self);
        let name = HeaderName::try_from(name).map_err(ResponseError::invalid_header)?;
        let value = HeaderValue::try_from(value).map_err(ResponseError::invalid_header)?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn remove_header(&mut self, name: &str) -> Result<&mut Self, ResponseError> {
        ensure_writable!(self);
        self.headers.remove(name);
        Ok(self)
    }

    pub fn content_type(&mut self, mime: Mime) -> Result<&mut Self, ResponseError> {
        self.set_header(CONTENT_TYPE, mime.as_ref())
    }

    /// Appends to the body buffer, replacing a deferred file.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> Result<&mut Self, ResponseError> {
        ensure_writable!(self);
        self.file = None;
        self.body.get_or_insert_with(BytesMut::new).extend_from_slice(chunk.as_ref());
        Ok(self)
    }

    /// Replaces the body buffer, replacing a deferred file.
    pub fn set_body(&mut self, body: impl AsRef<[u8]>) -> Result<&mut Self, ResponseError> {
        ensure_writable!(self);
        self.file = None;
        self.body = Some(BytesMut::from(body.as_ref()));
        Ok(self)
    }

    /// The body written so far, `None` if it was never set.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Sends the file at `path` as the body. The file is read, and its content type
    /// guessed, when the response ends.
    pub fn file(&mut self, path: impl Into<PathBuf>) -> Result<&mut Self, ResponseError> {
        ensure_writable!(self);
        self.body = None;
        self.file = Some(path.into());
        Ok(self)
    }

    /// Serializes `value` as the body and ends the response.
    pub async fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ResponseError> {
        ensure_writable!(self);
        let body = serde_json::to_vec(value)?;
        self.set_header(CONTENT_TYPE, "application/json; charset=utf-8")?;
        self.set_body(body)?;
        self.end().await
    }

    /// Writes `chunk` and ends the response.
    pub async fn send(&mut self, chunk: impl AsRef<[u8]>) -> Result<(), ResponseError> {
        self.write(chunk)?;
        self.end().await
    }

    /// Finalizes and sends the response.
    ///
    /// The pair leaves `Idle` before anything else happens, and reaches `Ended` whether
    /// or not the write succeeded. If a deferred file can't be loaded the client gets a
    /// `404` or `500` error response and the file error is returned.
    pub async fn end(&mut self) -> Result<(), ResponseError> {
        if !self.state.begin_ending() {
            return Err(ResponseError::NotWritable);
        }
        let result = self.finalize().await;
        self.state.finish();
        result
    }

    async fn finalize(&mut self) -> Result<(), ResponseError> {
        let mut file_error = None;
        if let Some(path) = self.file.take() {
            match self.resolver.resolve(&path).await {
                Ok(file) => {
                    let content_type = HeaderValue::try_from(file.mime.as_ref()).map_err(ResponseError::invalid_header)?;
                    self.headers.insert(CONTENT_TYPE, content_type);
                    self.body = Some(BytesMut::from(file.content.as_ref()));
                }
                Err(e) => {
                    warn!(cause = %e, path = %path.display(), "can't load response file");
                    self.status = match e.kind() {
                        io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
                        io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                        _ => StatusCode::INTERNAL_SERVER_ERROR,
                    };
                    self.headers.remove(CONTENT_TYPE);
                    file_error = Some(e);
                }
            }
        }

        let body = match self.body.take() {
            Some(body) => body.freeze(),
            None if self.status.as_u16() >= 400 => fallback_body(self.status),
            None => Bytes::new(),
        };

        if !body.is_empty() && !self.headers.contains_key(CONTENT_TYPE) {
            self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        }
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.headers.insert(X_POWERED_BY, POWERED_BY_TEXA);
        if let Some(date) = http_date() {
            self.headers.insert(DATE, date);
        }

        let mut response = http::Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();

        let responder = self.responder.take().ok_or(SendError::Closed)?;
        responder.respond(response).await?;

        match file_error {
            Some(source) => Err(ResponseError::File { source }),
            None => Ok(()),
        }
    }
}

/// `"{code} - {reason}"`, or an empty body for codes without a standard reason.
fn fallback_body(status: StatusCode) -> Bytes {
    match status.canonical_reason() {
        Some(reason) => Bytes::from(format!("{} - {}", status.as_u16(), reason)),
        None => Bytes::new(),
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("lifecycle", &self.state.lifecycle())
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(BytesMut::len))
            .field("file", &self.file)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FsResolver, MockFileResolver, ResolvedFile};
    use crate::pair::Lifecycle;
    use texa_http::connection::{ReplyReceiver, responder};

    fn response_with(resolver: Arc<dyn FileResolver>) -> (Response, ReplyReceiver) {
        let (responder, receiver) = responder();
        (Response::new(PairState::new(), responder, resolver), receiver)
    }

    fn response() -> (Response, ReplyReceiver) {
        response_with(Arc::new(FsResolver))
    }

    #[tokio::test]
    async fn end_sends_once() {
        let (mut res, receiver) = response();
        res.status(201u16).unwrap().set_header("X-Request-Id", "abc").unwrap().write("created").unwrap();

        let (result, sent) = tokio::join!(res.end(), receiver.accept());
        result.unwrap();

        let sent = sent.unwrap();
        assert_eq!(sent.status(), StatusCode::CREATED);
        assert_eq!(sent.body().as_ref(), b"created");
        assert_eq!(sent.headers()["x-request-id"], "abc");
        assert_eq!(sent.headers()["content-length"], "7");
        assert_eq!(sent.headers()["x-powered-by"], "Texa");
        assert!(sent.headers().contains_key(DATE));
        assert_eq!(res.state().lifecycle(), Lifecycle::Ended);

        assert!(res.end().await.unwrap_err().is_not_writable());
    }

    #[tokio::test]
    async fn every_mutator_rejected_after_end() {
        let (mut res, receiver) = response();
        let (result, _) = tokio::join!(res.end(), receiver.accept());
        result.unwrap();

        assert!(res.set_status(StatusCode::NOT_FOUND).unwrap_err().is_not_writable());
        assert!(res.status(404u16).unwrap_err().is_not_writable());
        assert!(res.set_header("x-a", "b").unwrap_err().is_not_writable());
        assert!(res.append_header("x-a", "b").unwrap_err().is_not_writable());
        assert!(res.remove_header("x-a").unwrap_err().is_not_writable());
        assert!(res.write("more").unwrap_err().is_not_writable());
        assert!(res.set_body("more").unwrap_err().is_not_writable());
        assert!(res.file("index.html").unwrap_err().is_not_writable());
        assert!(res.content_type(mime::TEXT_HTML).unwrap_err().is_not_writable());
        assert!(res.json(&"x").await.unwrap_err().is_not_writable());
        assert!(res.send("x").await.unwrap_err().is_not_writable());
        assert_eq!(res.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn fallback_body_for_errors() {
        let (mut res, receiver) = response();
        res.status(StatusCode::NOT_FOUND).unwrap();

        let (result, sent) = tokio::join!(res.end(), receiver.accept());
        result.unwrap();
        assert_eq!(sent.unwrap().body().as_ref(), b"404 - Not Found");
    }

    #[tokio::test]
    async fn explicit_empty_body_suppresses_fallback() {
        let (mut res, receiver) = response();
        res.status(StatusCode::INTERNAL_SERVER_ERROR).unwrap().set_body("").unwrap();

        let (result, sent) = tokio::join!(res.end(), receiver.accept());
        result.unwrap();
        let sent = sent.unwrap();
        assert!(sent.body().is_empty());
        assert_eq!(sent.headers()["content-length"], "0");
    }

    #[tokio::test]
    async fn latest_file_wins() {
        let mut resolver = MockFileResolver::new();
        resolver
            .expect_resolve()
            .withf(|path| path.ends_with("second.html"))
            .times(1)
            .returning(|_| Ok(ResolvedFile { content: Bytes::from_static(b"<h1>second</h1>"), mime: mime::TEXT_HTML_UTF_8 }));

        let (mut res, receiver) = response_with(Arc::new(resolver));
        res.write("ignored").unwrap().file("first.html").unwrap().file("public/second.html").unwrap();

        let (result, sent) = tokio::join!(res.end(), receiver.accept());
        result.unwrap();
        let sent = sent.unwrap();
        assert_eq!(sent.body().as_ref(), b"<h1>second</h1>");
        assert_eq!(sent.headers()["content-type"], "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn write_after_file_drops_file() {
        let mut resolver = MockFileResolver::new();
        resolver.expect_resolve().never();

        let (mut res, receiver) = response_with(Arc::new(resolver));
        res.file("index.html").unwrap().write("inline").unwrap();

        let (result, sent) = tokio::join!(res.end(), receiver.accept());
        result.unwrap();
        assert_eq!(sent.unwrap().body().as_ref(), b"inline");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let mut resolver = MockFileResolver::new();
        resolver.expect_resolve().returning(|_| Err(io::Error::from(io::ErrorKind::NotFound)));

        let (mut res, receiver) = response_with(Arc::new(resolver));
        res.file("missing.html").unwrap();

        let (result, sent) = tokio::join!(res.end(), receiver.accept());
        assert!(matches!(result, Err(ResponseError::File { .. })));
        let sent = sent.unwrap();
        assert_eq!(sent.status(), StatusCode::NOT_FOUND);
        assert_eq!(sent.body().as_ref(), b"404 - Not Found");
        assert_eq!(res.state().lifecycle(), Lifecycle::Ended);
    }

    #[tokio::test]
    async fn json_ends_response() {
        let (mut res, receiver) = response();

        let value = serde_json::json!({"ok": true});
        let (result, sent) = tokio::join!(res.json(&value), receiver.accept());
        result.unwrap();
        let sent = sent.unwrap();
        assert_eq!(sent.headers()["content-type"], "application/json; charset=utf-8");
        assert_eq!(sent.body().as_ref(), br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn failed_write_still_ends() {
        let (mut res, receiver) = response();
        drop(receiver);

        let result = res.send("lost").await;
        assert!(matches!(result, Err(ResponseError::Send { .. })));
        assert_eq!(res.state().lifecycle(), Lifecycle::Ended);
        assert!(!res.is_writable());
    }
}
