//! Request body decoding. Only `Content-Length` delimited bodies are accepted.

mod length_decoder;

pub use length_decoder::LengthDecoder;
