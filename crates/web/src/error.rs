use std::io;

use texa_http::protocol::SendError;
use thiserror::Error;

/// Failures of [`Response`](crate::Response) operations.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("The response is no longer writable!")]
    NotWritable,

    #[error("invalid status code: {source}")]
    InvalidStatus { source: http::Error },

    #[error("invalid header: {source}")]
    InvalidHeader { source: http::Error },

    #[error("json serialize error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("can't load file: {source}")]
    File { source: io::Error },

    #[error("can't send response: {source}")]
    Send {
        #[from]
        source: SendError,
    },
}

impl ResponseError {
    pub fn invalid_status<E: Into<http::Error>>(e: E) -> Self {
        Self::InvalidStatus { source: e.into() }
    }

    pub fn invalid_header<E: Into<http::Error>>(e: E) -> Self {
        Self::InvalidHeader { source: e.into() }
    }

    pub fn is_not_writable(&self) -> bool {
        matches!(self, ResponseError::NotWritable)
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl RouteError {
    pub fn invalid_pattern<P: ToString, R: ToString>(pattern: P, reason: R) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }
}

/// Errors raised while building an [`Application`](crate::Application).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("route error: {source}")]
    Route {
        #[from]
        source: RouteError,
    },

    #[error("invalid log level '{level}'")]
    InvalidLogLevel { level: String },
}
