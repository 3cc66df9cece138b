use bytes::{Bytes, BytesMut};
use http::Response;
use tokio_util::codec::Encoder;

use crate::codec::header::HeaderEncoder;
use crate::protocol::SendError;

/// Encodes a whole response: the head, then the body in one piece.
///
/// When the request being answered was a `HEAD`, the connection switches the encoder to
/// [`omit_body`](ResponseEncoder::omit_body) so the announced length is kept while the
/// body bytes are dropped.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    omit_body: bool,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn omit_body(&mut self, omit: bool) {
        self.omit_body = omit;
    }
}

impl Encoder<Response<Bytes>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Response<Bytes>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (parts, body) = item.into_parts();
        let allows_body = !(parts.status.is_informational() || parts.status == http::StatusCode::NO_CONTENT);

        self.header_encoder.encode((parts, body.len()), dst)?;
        if allows_body && !self.omit_body {
            dst.extend_from_slice(&body);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn encodes_head_and_body() {
        let response = Response::builder().status(StatusCode::OK).body(Bytes::from_static(b"Hello World!")).unwrap();

        let mut dst = BytesMut::new();
        ResponseEncoder::new().encode(response, &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-length: 12\r\n"));
        assert!(text.ends_with("\r\n\r\nHello World!"));
    }

    #[test]
    fn head_request_omits_body() {
        let response = Response::builder().status(StatusCode::OK).body(Bytes::from_static(b"Hello World!")).unwrap();

        let mut encoder = ResponseEncoder::new();
        encoder.omit_body(true);
        let mut dst = BytesMut::new();
        encoder.encode(response, &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.contains("content-length: 12\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
