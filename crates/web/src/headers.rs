//! Read-only request headers with value coercion.
//!
//! Every value is coerced on read the same way: trimmed, then tried as an integer, then
//! as a finite float, then as a boolean word, falling back to text. This mirrors what
//! applications built on texa historically relied on, but it also turns an `ETag` of
//! `123` into a number. Use [`RequestHeaders::raw`] when the exact text matters.

use std::fmt;
use std::sync::LazyLock;

use http::HeaderMap;
use http::header::AsHeaderName;
use regex::Regex;

static TRUE_WORDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(y|yes|enabled?|on|true)$").expect("valid regex"));
static FALSE_WORDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(n|no|disabled?|off|false)$").expect("valid regex"));

/// A coerced request header value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Int(value) => Some(*value as f64),
            HeaderValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Text(text) => f.write_str(text),
            HeaderValue::Int(value) => write!(f, "{value}"),
            HeaderValue::Float(value) => write!(f, "{value}"),
            HeaderValue::Bool(value) => write!(f, "{value}"),
        }
    }
}

/// Coerces a raw header string.
pub fn coerce(raw: &str) -> HeaderValue {
    let value = raw.trim();
    if value.is_empty() {
        return HeaderValue::Text(raw.to_string());
    }
    if let Ok(int) = value.parse::<i64>() {
        return HeaderValue::Int(int);
    }
    if let Ok(float) = value.parse::<f64>()
        && float.is_finite()
    {
        return HeaderValue::Float(float);
    }
    if TRUE_WORDS.is_match(value) {
        return HeaderValue::Bool(true);
    }
    if FALSE_WORDS.is_match(value) {
        return HeaderValue::Bool(false);
    }
    HeaderValue::Text(value.to_string())
}

/// The headers of a request. Lookups are case-insensitive, repeated fields are joined
/// with `", "`.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    inner: HeaderMap,
}

impl RequestHeaders {
    pub fn new(inner: HeaderMap) -> Self {
        Self { inner }
    }

    /// The coerced value of `name`.
    pub fn get<K: AsHeaderName>(&self, name: K) -> Option<HeaderValue> {
        self.raw(name).map(|raw| coerce(&raw))
    }

    /// The value of `name` as sent. Non UTF-8 bytes are replaced.
    pub fn raw<K: AsHeaderName>(&self, name: K) -> Option<String> {
        let mut values = self.inner.get_all(name).iter().peekable();
        values.peek()?;
        let joined = values.map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned()).collect::<Vec<_>>().join(", ");
        Some(joined)
    }

    pub fn contains<K: AsHeaderName>(&self, name: K) -> bool {
        self.inner.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.keys_len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Names with their coerced values, one entry per distinct name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, HeaderValue)> + '_ {
        self.inner.keys().filter_map(|name| self.get(name).map(|value| (name.as_str(), value)))
    }

    pub fn as_header_map(&self) -> &HeaderMap {
        &self.inner
    }
}
