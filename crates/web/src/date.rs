//! The `Date` header value.

use bytes::Bytes;
use http::HeaderValue;

/// The current time formatted as an HTTP date, `None` if the formatted bytes are not a
/// valid header value.
pub(crate) fn http_date() -> Option<HeaderValue> {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    HeaderValue::from_maybe_shared(Bytes::from_owner(buf)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_gmt() {
        let date = http_date().unwrap();
        let text = date.to_str().unwrap();
        assert!(text.ends_with(" GMT"), "{text}");
        assert_eq!(text.len(), 29);
    }
}
