//! Configuration for the proxy pool and broker.

use crate::queue::QueueOrder;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::path::Path;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Headers sent with proxied requests and source fetches unless overridden.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers
}

/// Configuration for the proxy pool.
#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Extra source URLs to scrape proxy lists from.
    pub links: Vec<String>,
    /// Static proxy strings, parsed like scraped text.
    pub proxies: Vec<String>,
    /// Default timeout for proxied requests.
    pub timeout: Duration,
    /// Default headers for proxied requests and source fetches.
    pub headers: HeaderMap,
    /// Unbind a session's proxy when it turns out to be bad.
    pub clear_on_fail: bool,
    /// Register the built-in free proxy lists.
    pub free_sources: bool,
    /// How many queue slots each proxy occupies after a refresh.
    pub threads_per_proxy: usize,
    /// Serve proxies FIFO and return them to the pool after every call.
    pub rotating: bool,
    /// Cap on proxies admitted per source per refresh.
    pub max_proxies: usize,
    /// Timeout for fetching a single source.
    pub source_timeout: Duration,
    /// Give up waiting for a proxy after this long. `None` waits forever.
    pub acquire_timeout: Option<Duration>,
}

impl ProxyPoolConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProxyPoolConfigBuilder {
        ProxyPoolConfigBuilder::new()
    }

    /// Queue discipline implied by the rotating flag.
    pub fn queue_order(&self) -> QueueOrder {
        if self.rotating {
            QueueOrder::Fifo
        } else {
            QueueOrder::Lifo
        }
    }
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        ProxyPoolConfigBuilder::new().build()
    }
}

/// Builder for `ProxyPoolConfig`.
pub struct ProxyPoolConfigBuilder {
    links: Vec<String>,
    proxies: Vec<String>,
    timeout: Option<Duration>,
    headers: Option<HeaderMap>,
    clear_on_fail: Option<bool>,
    free_sources: Option<bool>,
    threads_per_proxy: Option<usize>,
    rotating: Option<bool>,
    max_proxies: Option<usize>,
    source_timeout: Option<Duration>,
    acquire_timeout: Option<Duration>,
}

impl ProxyPoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            links: Vec::new(),
            proxies: Vec::new(),
            timeout: None,
            headers: None,
            clear_on_fail: None,
            free_sources: None,
            threads_per_proxy: None,
            rotating: None,
            max_proxies: None,
            source_timeout: None,
            acquire_timeout: None,
        }
    }

    /// Set additional source URLs to fetch proxy lists from.
    pub fn links(mut self, links: Vec<impl Into<String>>) -> Self {
        self.links = links.into_iter().map(Into::into).collect();
        self
    }

    /// Set a static list of proxies, e.g. the lines of a proxy file.
    pub fn proxies(mut self, proxies: Vec<impl Into<String>>) -> Self {
        self.proxies = proxies.into_iter().map(Into::into).collect();
        self
    }

    /// Load the static proxy list from a file, one entry per line.
    pub fn proxies_from_file(mut self, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        self.proxies = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect();
        Ok(self)
    }

    /// Set the default per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the default outbound request headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Clear a session's proxy after a bad-proxy failure.
    pub fn clear_on_fail(mut self, clear: bool) -> Self {
        self.clear_on_fail = Some(clear);
        self
    }

    /// Include the built-in free proxy sources.
    pub fn free_sources(mut self, enabled: bool) -> Self {
        self.free_sources = Some(enabled);
        self
    }

    /// Set how many concurrent holders one proxy is queued for.
    pub fn threads_per_proxy(mut self, count: usize) -> Self {
        self.threads_per_proxy = Some(count);
        self
    }

    /// Enable rotating mode.
    pub fn rotating(mut self, rotating: bool) -> Self {
        self.rotating = Some(rotating);
        self
    }

    /// Set the per-source cap on admitted proxies.
    pub fn max_proxies(mut self, max: usize) -> Self {
        self.max_proxies = Some(max);
        self
    }

    /// Set the timeout for fetching a single source.
    pub fn source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = Some(timeout);
        self
    }

    /// Bound how long `acquire` may wait for a proxy.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProxyPoolConfig {
        ProxyPoolConfig {
            links: self.links,
            proxies: self.proxies,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
            headers: self.headers.unwrap_or_else(default_headers),
            clear_on_fail: self.clear_on_fail.unwrap_or(false),
            free_sources: self.free_sources.unwrap_or(true),
            threads_per_proxy: self.threads_per_proxy.unwrap_or(1).max(1),
            rotating: self.rotating.unwrap_or(false),
            max_proxies: self.max_proxies.unwrap_or(10_000),
            source_timeout: self.source_timeout.unwrap_or(Duration::from_secs(10)),
            acquire_timeout: self.acquire_timeout,
        }
    }
}

impl Default for ProxyPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyPoolConfig::default();
        assert!(config.links.is_empty());
        assert!(config.proxies.is_empty());
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.headers.contains_key(USER_AGENT));
        assert!(!config.clear_on_fail);
        assert!(config.free_sources);
        assert_eq!(config.threads_per_proxy, 1);
        assert!(!config.rotating);
        assert_eq!(config.max_proxies, 10_000);
        assert_eq!(config.source_timeout, Duration::from_secs(10));
        assert_eq!(config.acquire_timeout, None);
        assert_eq!(config.queue_order(), QueueOrder::Lifo);
    }

    #[test]
    fn test_rotating_selects_fifo() {
        let config = ProxyPoolConfig::builder().rotating(true).build();
        assert_eq!(config.queue_order(), QueueOrder::Fifo);
    }

    #[test]
    fn test_proxies_from_file_skips_comments() {
        let path = std::env::temp_dir().join(format!("proxy-list-{}.txt", std::process::id()));
        std::fs::write(&path, "# exported list\n10.0.0.1:8080\n\n  10.0.0.2:3128  \n").unwrap();

        let config = ProxyPoolConfig::builder().proxies_from_file(&path).unwrap().build();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.proxies, vec!["10.0.0.1:8080", "10.0.0.2:3128"]);
    }

    #[test]
    fn test_missing_proxy_file_is_error() {
        let result = ProxyPoolConfig::builder().proxies_from_file("/nonexistent/proxies.txt");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_fanout_is_one() {
        let config = ProxyPoolConfig::builder().threads_per_proxy(0).build();
        assert_eq!(config.threads_per_proxy, 1);
    }
}
