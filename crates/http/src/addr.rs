//! Listen address parsing.
//!
//! Accepts `host:port`, `:port`, a bare `host`, and bracketed IPv6 literals such as
//! `[::1]:8080`. A missing host becomes `127.0.0.1`, a missing port becomes `0`.

use std::fmt;

use thiserror::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub hostname: String,
    pub port: u16,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid address '{address}': {reason}")]
pub struct AddrError {
    pub address: String,
    pub reason: String,
}

impl AddrError {
    fn new<R: ToString>(address: &str, reason: R) -> Self {
        Self { address: address.to_string(), reason: reason.to_string() }
    }
}

pub fn parse_addr(addr: &str) -> Result<Address, AddrError> {
    parse_addr_with(addr, DEFAULT_HOST, DEFAULT_PORT)
}

pub fn parse_addr_with(addr: &str, default_host: &str, default_port: u16) -> Result<Address, AddrError> {
    let trimmed = addr.trim();
    if trimmed.contains(['/', '?', '#', '@']) || trimmed.contains(char::is_whitespace) {
        return Err(AddrError::new(addr, "unexpected character"));
    }

    let (host, port) = if let Some(rest) = trimmed.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(|| AddrError::new(addr, "unclosed '['"))?;
        if host.parse::<std::net::Ipv6Addr>().is_err() {
            return Err(AddrError::new(addr, "invalid ipv6 literal"));
        }
        let port = match after {
            "" => None,
            after => Some(after.strip_prefix(':').ok_or_else(|| AddrError::new(addr, "expected ':' after ']'"))?),
        };
        (host, port)
    } else {
        match trimmed.rsplit_once(':') {
            Some((host, _)) if host.contains(':') => return Err(AddrError::new(addr, "ipv6 hosts must be bracketed")),
            Some((host, port)) => (host, Some(port)),
            None => (trimmed, None),
        }
    };

    let port = match port {
        None | Some("") => default_port,
        Some(port) => port.parse::<u16>().map_err(|e| AddrError::new(addr, format!("invalid port: {e}")))?,
    };
    let hostname = if host.is_empty() { default_host.to_string() } else { host.to_ascii_lowercase() };

    Ok(Address { hostname, port })
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hostname.contains(':') {
            write!(f, "[{}]:{}", self.hostname, self.port)
        } else {
            write!(f, "{}:{}", self.hostname, self.port)
        }
    }
}
