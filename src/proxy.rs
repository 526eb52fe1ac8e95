//! Proxy representation.

use crate::error::ProxyError;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Protocol to proxy address mapping, e.g. `"http" => "http://1.2.3.4:8080"`.
pub type ProxyMap = BTreeMap<String, String>;

/// A single forward-proxy endpoint.
///
/// Equality and hashing use the `(host, port)` pair, so the same endpoint
/// scraped from two sources collapses into one entry of a set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Proxy {
    host: String,
    port: u16,
}

impl Proxy {
    /// Create a proxy from a host and a non-zero port.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ProxyError> {
        let host = host.into();
        if host.is_empty() {
            return Err(ProxyError::InvalidProxy("empty host".to_string()));
        }
        if port == 0 {
            return Err(ProxyError::InvalidProxy(format!("{}:0", host)));
        }
        Ok(Self { host, port })
    }

    /// Build a proxy from the textual pair produced by the formatter.
    pub fn from_parts(host: &str, port: &str) -> Result<Self, ProxyError> {
        let port = port
            .parse::<u16>()
            .map_err(|_| ProxyError::InvalidProxy(format!("{}:{}", host, port)))?;
        Self::new(host, port)
    }

    /// Recover a proxy from an address such as `http://1.2.3.4:8080`.
    pub fn from_url(url: &str) -> Result<Self, ProxyError> {
        let parsed = Url::parse(url).map_err(|e| ProxyError::InvalidProxy(format!("{}: {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ProxyError::InvalidProxy(url.to_string()))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| ProxyError::InvalidProxy(url.to_string()))?;
        Self::new(host, port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The address HTTP clients should route through.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Protocol-keyed proxy configuration, both schemes routed via this proxy.
    pub fn as_map(&self) -> ProxyMap {
        let url = self.url();
        let mut map = ProxyMap::new();
        map.insert("http".to_string(), url.clone());
        map.insert("https".to_string(), url);
        map
    }

    /// Convert the proxy to a reqwest::Proxy covering all schemes.
    pub fn to_reqwest_proxy(&self) -> Result<reqwest::Proxy, reqwest::Error> {
        reqwest::Proxy::all(self.url())
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Proxy {
    type Err = ProxyError;

    /// Parse `host:port`, with or without a scheme prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains("://") {
            return Self::from_url(s);
        }
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ProxyError::InvalidProxy(s.to_string()))?;
        Self::from_parts(host, port)
    }
}
