//! Response head encoding.
//!
//! Writes the status line and header fields of a response. `Content-Length` always
//! reflects the body that follows, except for 1xx and 204 responses which must not
//! carry one.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::response::Parts;
use http::{HeaderValue, StatusCode, Version, header};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::SendError;

const INIT_HEADER_SIZE: usize = 4 * 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderEncoder;

impl Encoder<(Parts, usize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (Parts, usize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut parts, body_size) = item;

        let version = match parts.version {
            Version::HTTP_11 | Version::HTTP_10 => "HTTP/1.1",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(SendError::invalid_response(format!("unsupported http version {v:?}")));
            }
        };

        dst.reserve(INIT_HEADER_SIZE);
        let reason = parts.status.canonical_reason().unwrap_or("");
        write!(BufWriter(dst), "{version} {} {reason}\r\n", parts.status.as_str())?;

        if allows_content_length(parts.status) {
            parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body_size));
        } else {
            parts.headers.remove(header::CONTENT_LENGTH);
        }

        for (name, value) in parts.headers.iter() {
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

fn allows_content_length(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT)
}

struct BufWriter<'a>(&'a mut BytesMut);

impl Write for BufWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
