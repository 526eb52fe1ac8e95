//! Error types for the reqwest-proxy-broker crate.

use crate::proxy::Proxy;

use std::time::Duration;
use thiserror::Error;

/// The proxy used for a request failed at the transport layer.
///
/// Callers decide whether to retry with a freshly acquired proxy.
#[derive(Debug, Clone, Error)]
#[error("bad proxy {proxy}: {}", .message.as_deref().unwrap_or("transport failure"))]
pub struct BadProxyError {
    /// The proxy that failed.
    pub proxy: Proxy,
    /// Diagnostic message of the underlying failure, if any.
    pub message: Option<String>,
}

impl BadProxyError {
    pub fn new(proxy: Proxy, message: Option<String>) -> Self {
        Self { proxy, message }
    }
}

/// Errors surfaced by the pool and the broker.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    BadProxy(#[from] BadProxyError),

    /// No proxy became available within the configured acquire timeout.
    #[error("no proxy became available within {0:?}")]
    PoolExhausted(Duration),

    /// The request failed for a reason not attributed to the proxy. The
    /// proxy is still checked out and can be released by the caller.
    #[error("request via {proxy} failed: {message}")]
    Request { proxy: Proxy, message: String },

    #[error("invalid proxy: {0}")]
    InvalidProxy(String),

    #[error("invalid proxy source: {0}")]
    InvalidSource(String),
}

/// Failure to retrieve a proxy list from a source.
///
/// Never crosses the pool boundary: the manager logs it and treats the
/// source as having contributed no proxies.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out fetching {0}")]
    Timeout(String),

    #[error("received {status} from {url}")]
    Status { url: String, status: reqwest::StatusCode },

    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_proxy_display() {
        let proxy = Proxy::new("10.0.0.1", 8080).unwrap();
        let bare = BadProxyError::new(proxy.clone(), None);
        assert_eq!(bare.to_string(), "bad proxy 10.0.0.1:8080: transport failure");

        let detailed = BadProxyError::new(proxy, Some("connection refused".to_string()));
        assert_eq!(detailed.to_string(), "bad proxy 10.0.0.1:8080: connection refused");
    }

    #[test]
    fn test_proxy_error_from_bad_proxy() {
        let proxy = Proxy::new("10.0.0.1", 8080).unwrap();
        let err: ProxyError = BadProxyError::new(proxy.clone(), None).into();
        match err {
            ProxyError::BadProxy(bad) => assert_eq!(bad.proxy, proxy),
            other => panic!("unexpected error: {other}"),
        }
    }
}
