//! Streaming request decoding.
//!
//! [`RequestDecoder`] alternates between two states: waiting for a request head, and
//! draining the body that head announced. A request without a body still yields a
//! [`PayloadItem::Eof`] right after its head, so consumers can always read until `Eof`.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::LengthDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    body_decoder: Option<LengthDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(body_decoder) = &mut self.body_decoder {
            let message = match body_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(PayloadItem::Eof) => {
                    self.body_decoder = None;
                    Some(Message::Payload(PayloadItem::Eof))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.body_decoder = Some(LengthDecoder::new(payload_size.len()));
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn pipelined_requests() {
        let str = indoc! {r##"
        POST /messages HTTP/1.1
        Content-Length: 5

        helloGET /messages HTTP/1.1
        Host: localhost

        "##};

        let mut buf = BytesMut::from(str);
        let mut decoder = RequestDecoder::new();

        let Some(Message::Header((header, size))) = decoder.decode(&mut buf).unwrap() else { panic!("expect head") };
        assert_eq!(header.uri().path(), "/messages");
        assert_eq!(size, PayloadSize::Length(5));

        let chunk = decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().as_ref(), b"hello");

        let eof = decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap();
        assert!(eof.is_eof());

        let Some(Message::Header((header, size))) = decoder.decode(&mut buf).unwrap() else { panic!("expect head") };
        assert_eq!(header.method(), &http::Method::GET);
        assert!(size.is_empty());

        let eof = decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap();
        assert!(eof.is_eof());
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }
}
