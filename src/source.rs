//! Retrieval of proxy lists from remote sources.

use crate::error::FetchError;
use crate::format::format_proxies;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Free proxy lists registered when `free_sources` is enabled. Each lives on
/// its own host, since sources are keyed by hostname.
pub const FREE_SOURCES: &[&str] = &[
    "https://api.proxyscrape.com/v2/?request=getproxies&protocol=http&timeout=10000&country=all",
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt",
    "https://www.proxy-list.download/api/v1/get?type=http",
    "https://free-proxy-list.net/",
    "https://www.sslproxies.org/",
];

/// Something that can turn a source URL into candidate `(host, port)` pairs.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<(String, String)>, FetchError>;
}

/// Fetches proxy lists over HTTP and runs them through the formatter.
#[derive(Debug, Clone)]
pub struct HttpSourceFetcher {
    client: Client,
    headers: HeaderMap,
    timeout: Duration,
}

impl HttpSourceFetcher {
    pub fn new(headers: HeaderMap, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            headers,
            timeout,
        }
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<(String, String)>, FetchError> {
        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    debug!("Timed out while retrieving proxies from {}", url);
                    FetchError::Timeout(url.to_string())
                } else {
                    FetchError::Http { url: url.to_string(), source: e }
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            error!("Received {} while retrieving proxies from {}", status, url);
            return Err(FetchError::Status { url: url.to_string(), status });
        }

        let text = response.text().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            source: e,
        })?;

        let proxies = format_proxies(&text);
        if proxies.is_empty() {
            debug!("Unable to retrieve proxies from {}. Response: {}", url, text);
        }
        Ok(proxies)
    }
}
