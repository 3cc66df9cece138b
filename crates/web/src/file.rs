//! Loading files for responses.
//!
//! [`FileResolver`] turns a path into the bytes to send and their content type. It is
//! consulted by [`Response::end`](crate::Response::end) for responses set up with
//! [`Response::file`](crate::Response::file), and by the [`Static`](crate::middleware::Static)
//! middleware.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use mime::Mime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub content: Bytes,
    pub mime: Mime,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileResolver: Send + Sync {
    async fn resolve(&self, path: &Path) -> io::Result<ResolvedFile>;
}

/// Reads files from the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsResolver;

#[async_trait]
impl FileResolver for FsResolver {
    async fn resolve(&self, path: &Path) -> io::Result<ResolvedFile> {
        let content = tokio::fs::read(path).await?;
        Ok(ResolvedFile { content: Bytes::from(content), mime: mime_for_path(path) })
    }
}

/// Guesses a content type from the file extension, `text/plain` when unknown.
pub fn mime_for_path(path: &Path) -> Mime {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("html" | "htm") => mime::TEXT_HTML_UTF_8,
        Some("css") => mime::TEXT_CSS_UTF_8,
        Some("js" | "mjs") => mime::APPLICATION_JAVASCRIPT_UTF_8,
        Some("json") => mime::APPLICATION_JSON,
        Some("txt") => mime::TEXT_PLAIN_UTF_8,
        Some("csv") => mime::TEXT_CSV_UTF_8,
        Some("xml") => mime::TEXT_XML,
        Some("svg") => mime::IMAGE_SVG,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("bmp") => mime::IMAGE_BMP,
        Some("woff") => mime::FONT_WOFF,
        Some("woff2") => mime::FONT_WOFF2,
        Some("pdf") => mime::APPLICATION_PDF,
        Some("wasm") => "application/wasm".parse().ok().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        Some("ico") => "image/x-icon".parse().ok().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        Some("webp") => "image/webp".parse().ok().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::TEXT_PLAIN_UTF_8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn guesses_common_types() {
        assert_eq!(mime_for_path(Path::new("public/index.HTML")), mime::TEXT_HTML_UTF_8);
        assert_eq!(mime_for_path(Path::new("app.js")), mime::APPLICATION_JAVASCRIPT_UTF_8);
        assert_eq!(mime_for_path(Path::new("logo.svg")), mime::IMAGE_SVG);
        assert_eq!(mime_for_path(Path::new("module.wasm")).essence_str(), "application/wasm");
        assert_eq!(mime_for_path(Path::new("LICENSE")), mime::TEXT_PLAIN_UTF_8);
    }

    #[tokio::test]
    async fn reads_from_disk() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        let file = FsResolver.resolve(&path).await.unwrap();

        assert!(file.content.starts_with(b"[package]"));
        assert_eq!(file.mime, mime::TEXT_PLAIN_UTF_8);
    }

    #[tokio::test]
    async fn missing_file() {
        let error = FsResolver.resolve(Path::new("does/not/exist.html")).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }
}
