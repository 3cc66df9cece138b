use std::sync::Arc;

use bytes::Bytes;
use texa_http::connection::{ReplyReceiver, responder};

use crate::Pair;
use crate::file::FsResolver;

pub(crate) fn pair(method: &str, uri: &str) -> (Pair, ReplyReceiver) {
    let incoming = http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap();
    let (responder, receiver) = responder();
    (Pair::new(incoming, responder, Arc::new(FsResolver)), receiver)
}
