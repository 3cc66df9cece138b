//! Serving files from a directory.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::{fmt, io};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use mime::Mime;
use tracing::{debug, warn};

use super::{BoxError, Middleware, Next};
use crate::{Request, Response};

/// Serves `GET` and `HEAD` requests from a directory.
///
/// The remaining request path is looked up under the directory. A directory is served
/// through its first existing index file, a path without extension may be completed with
/// one of the vanity extensions. When a file is found the response ends with it and the
/// chain stops; otherwise the chain continues. Permission errors answer `403`.
///
/// Files whose extension has a [`FileHandler`] are passed through it instead of being sent
/// as they are.
#[derive(Clone)]
pub struct Static {
    dir: PathBuf,
    indexes: Vec<String>,
    vanity_extensions: Vec<String>,
    handlers: HashMap<String, Arc<dyn FileHandler>>,
}

/// Turns a found file into the content to send.
///
/// Returning `None` sends nothing; the handler may have answered through `res` itself.
#[async_trait]
pub trait FileHandler: Send + Sync {
    async fn handle(&self, file: &Path, req: &mut Request, res: &mut Response) -> Result<Option<(Bytes, Mime)>, BoxError>;
}

/// A [`FileHandler`] built from a function of the file path.
#[derive(Debug, Clone)]
pub struct HandlerFn<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(PathBuf) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<(Bytes, Mime)>, BoxError>> + Send,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> FileHandler for HandlerFn<F>
where
    F: Fn(PathBuf) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<(Bytes, Mime)>, BoxError>> + Send,
{
    async fn handle(&self, file: &Path, _req: &mut Request, _res: &mut Response) -> Result<Option<(Bytes, Mime)>, BoxError> {
        (self.f)(file.to_path_buf()).await
    }
}

impl Static {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            indexes: vec!["index.html".to_string(), "default.html".to_string()],
            vanity_extensions: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.indexes.push(name.into());
        self
    }

    /// Lets `/about` be served by `about.<ext>`.
    pub fn vanity_extension(mut self, ext: impl AsRef<str>) -> Self {
        self.vanity_extensions.push(ext.as_ref().trim_start_matches('.').to_string());
        self
    }

    /// Passes files ending in `.<ext>` through `handler`.
    pub fn handler(mut self, ext: impl AsRef<str>, handler: impl FileHandler + 'static) -> Self {
        self.handlers.insert(extension_key(ext.as_ref()), Arc::new(handler));
        self
    }

    fn handler_for(&self, file: &Path) -> Option<&Arc<dyn FileHandler>> {
        let ext = file.extension()?.to_str()?;
        self.handlers.get(&extension_key(ext))
    }

    /// Sends what the file's handler produced. The chain only continues when nothing answered.
    async fn transform(&self, file: &Path, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
        debug!(file = %file.display(), "handling static file");
        let Some(handler) = self.handler_for(file) else {
            return next.proceed(req, res).await;
        };

        if let Some((content, mime)) = handler.handle(file, req, res).await?
            && res.is_writable()
            && !content.is_empty()
        {
            res.set_status(StatusCode::OK)?;
            res.content_type(mime)?.set_body(&content)?;
            res.end().await?;
        }

        if res.is_writable() {
            return next.proceed(req, res).await;
        }
        next.halt();
        Ok(())
    }

    async fn find_file(&self, request_path: &str) -> io::Result<Option<PathBuf>> {
        let path = self.dir.join(sanitize(request_path));

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => return Ok(Some(path)),
            Ok(meta) if meta.is_dir() => {
                for index in &self.indexes {
                    let candidate = path.join(index);
                    if is_file(&candidate).await? {
                        return Ok(Some(candidate));
                    }
                }
                return Ok(None);
            }
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        if path.extension().is_none() && path.file_name().is_some() {
            for ext in &self.vanity_extensions {
                let candidate = path.with_extension(ext);
                if is_file(&candidate).await? {
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }
}

fn extension_key(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

impl fmt::Debug for Static {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Static")
            .field("dir", &self.dir)
            .field("indexes", &self.indexes)
            .field("vanity_extensions", &self.vanity_extensions)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

async fn is_file(path: &Path) -> io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Resolves `.` and `..` against the root so the result never leaves the served directory.
fn sanitize(request_path: &str) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in Path::new(request_path).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::ParentDir => {
                clean.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    clean
}

#[async_trait]
impl Middleware for Static {
    async fn run(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return next.proceed(req, res).await;
        }

        match self.find_file(req.path()).await {
            Ok(Some(file)) if self.handler_for(&file).is_some() => self.transform(&file, req, res, next).await,
            Ok(Some(file)) => {
                debug!(file = %file.display(), "serving static file");
                res.file(file)?;
                res.end().await?;
                next.halt();
                Ok(())
            }
            Ok(None) => next.proceed(req, res).await,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                warn!(cause = %e, path = req.path(), "static file not accessible");
                res.set_status(StatusCode::FORBIDDEN)?;
                res.end().await?;
                next.halt();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{Addon, run_middleware};
    use crate::test_support::pair;

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("texa-static-{name}-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("docs")).unwrap();
        std::fs::write(dir.join("hello.txt"), "hello").unwrap();
        std::fs::write(dir.join("about.html"), "<p>about</p>").unwrap();
        std::fs::write(dir.join("docs/index.html"), "<p>docs</p>").unwrap();
        dir
    }

    #[test]
    fn sanitize_stays_inside() {
        assert_eq!(sanitize("/../../etc/passwd"), PathBuf::from("etc/passwd"));
        assert_eq!(sanitize("/a/./b/../c"), PathBuf::from("a/c"));
        assert_eq!(sanitize("/"), PathBuf::new());
    }

    #[tokio::test]
    async fn finds_files_indexes_and_vanity() {
        let dir = fixture_dir("find");
        let files = Static::new(&dir).vanity_extension(".html");

        assert_eq!(files.find_file("/hello.txt").await.unwrap(), Some(dir.join("hello.txt")));
        assert_eq!(files.find_file("/docs").await.unwrap(), Some(dir.join("docs/index.html")));
        assert_eq!(files.find_file("/about").await.unwrap(), Some(dir.join("about.html")));
        assert_eq!(files.find_file("/missing.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn serves_and_halts() {
        let dir = fixture_dir("serve");
        let chain = [Addon::from(Static::new(&dir))];
        let (mut pair, receiver) = pair("GET", "/hello.txt");

        let (diagnostics, sent) =
            tokio::join!(run_middleware(&chain, &mut pair.request, &mut pair.response), receiver.accept());

        assert!(!diagnostics.continued());
        assert!(!diagnostics.failed());
        let sent = sent.unwrap();
        assert_eq!(sent.status(), StatusCode::OK);
        assert_eq!(sent.body().as_ref(), b"hello");
        assert_eq!(sent.headers()["content-type"], "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn missing_file_continues() {
        let dir = fixture_dir("missing");
        let chain = [Addon::from(Static::new(&dir))];
        let (mut pair, _rx) = pair("GET", "/nope.txt");

        let diagnostics = run_middleware(&chain, &mut pair.request, &mut pair.response).await;
        assert!(diagnostics.continued());
        assert!(pair.is_writable());
    }

    async fn render_markdown(file: PathBuf) -> Result<Option<(Bytes, Mime)>, BoxError> {
        let text = tokio::fs::read_to_string(file).await?;
        Ok(Some((Bytes::from(format!("<pre>{text}</pre>")), mime::TEXT_HTML_UTF_8)))
    }

    async fn decline(_file: PathBuf) -> Result<Option<(Bytes, Mime)>, BoxError> {
        Ok(None)
    }

    #[tokio::test]
    async fn extension_handler_transforms_file() {
        let dir = fixture_dir("handler");
        std::fs::write(dir.join("notes.md"), "# notes").unwrap();
        let chain = [Addon::from(Static::new(&dir).handler(".MD", handler_fn(render_markdown)))];
        let (mut pair, receiver) = pair("GET", "/notes.md");

        let (diagnostics, sent) =
            tokio::join!(run_middleware(&chain, &mut pair.request, &mut pair.response), receiver.accept());

        assert!(!diagnostics.continued());
        let sent = sent.unwrap();
        assert_eq!(sent.status(), StatusCode::OK);
        assert_eq!(sent.headers()["content-type"], "text/html; charset=utf-8");
        assert_eq!(sent.body().as_ref(), b"<pre># notes</pre>");
    }

    #[tokio::test]
    async fn declining_handler_continues() {
        let dir = fixture_dir("decline");
        let chain = [Addon::from(Static::new(&dir).handler("txt", handler_fn(decline)))];
        let (mut pair, _rx) = pair("GET", "/hello.txt");

        let diagnostics = run_middleware(&chain, &mut pair.request, &mut pair.response).await;
        assert!(diagnostics.continued());
        assert!(pair.is_writable());
    }

    #[tokio::test]
    async fn ignores_post() {
        let dir = fixture_dir("post");
        let chain = [Addon::from(Static::new(&dir))];
        let (mut pair, _rx) = pair("POST", "/hello.txt");

        let diagnostics = run_middleware(&chain, &mut pair.request, &mut pair.response).await;
        assert!(diagnostics.continued());
    }
}
