//! Application settings.

use serde::Deserialize;

const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Settings of an [`Application`](crate::Application).
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use texa::Config;
///
/// let config: Config = serde_json::from_str(r#"{ "address": ":8080", "log_level": "debug" }"#).unwrap();
/// assert_eq!(config.address, ":8080");
/// assert!(config.allow_websocket);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `host:port`, `:port` or `[v6]:port`
    pub address: String,
    pub allow_websocket: bool,
    /// Whether connections are reused for further requests.
    pub keep_alive: bool,
    pub max_body_size: usize,
    /// When set, a `tracing` subscriber with this max level is installed by `listen`.
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:0".to_string(),
            allow_websocket: true,
            keep_alive: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            log_level: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{ "allow_websocket": false, "max_body_size": 64 }"#).unwrap();
        assert_eq!(config.address, "127.0.0.1:0");
        assert!(!config.allow_websocket);
        assert!(config.keep_alive);
        assert_eq!(config.max_body_size, 64);
        assert_eq!(config.log_level, None);
    }
}
