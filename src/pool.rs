//! Core proxy pool implementation.

use crate::config::ProxyPoolConfig;
use crate::error::ProxyError;
use crate::format::format_proxies;
use crate::proxy::Proxy;
use crate::queue::{ProxyQueue, QueueOrder};
use crate::source::{HttpSourceFetcher, SourceFetcher, FREE_SOURCES};

use futures::future;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Owns the queue of available proxies and the policy for refilling it.
///
/// Proxies are handed out with [`acquire`](Self::acquire) and given back
/// with [`release`](Self::release). When the queue runs dry, the next
/// acquirer refreshes it from the static list and every registered source.
pub struct ProxyManager {
    /// Source URLs keyed by hostname.
    sources: RwLock<HashMap<String, String>>,
    /// Candidates parsed from the static proxy list.
    static_proxies: Vec<(String, String)>,
    known: Mutex<HashSet<Proxy>>,
    bad: Mutex<HashSet<Proxy>>,
    queue: ProxyQueue,
    fetcher: Arc<dyn SourceFetcher>,
    /// Serializes refreshes so racing acquirers share one.
    refresh_lock: tokio::sync::Mutex<()>,
    max_proxies: usize,
    threads_per_proxy: usize,
    acquire_timeout: Option<Duration>,
}

impl ProxyManager {
    /// Create a manager that fetches sources over HTTP.
    ///
    /// Nothing is fetched until the first [`refresh`](Self::refresh) or
    /// [`acquire`](Self::acquire).
    pub fn new(config: &ProxyPoolConfig) -> Self {
        let fetcher = HttpSourceFetcher::new(config.headers.clone(), config.source_timeout);
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a manager using a custom source fetcher.
    pub fn with_fetcher(config: &ProxyPoolConfig, fetcher: Arc<dyn SourceFetcher>) -> Self {
        let manager = Self {
            sources: RwLock::new(HashMap::new()),
            static_proxies: format_proxies(&config.proxies.join("\n")),
            known: Mutex::new(HashSet::new()),
            bad: Mutex::new(HashSet::new()),
            queue: ProxyQueue::new(config.queue_order()),
            fetcher,
            refresh_lock: tokio::sync::Mutex::new(()),
            max_proxies: config.max_proxies,
            threads_per_proxy: config.threads_per_proxy.max(1),
            acquire_timeout: config.acquire_timeout,
        };

        let defaults: &[&str] = if config.free_sources { FREE_SOURCES } else { &[] };
        let links = defaults.iter().copied().chain(config.links.iter().map(String::as_str));
        for link in links {
            if let Err(e) = manager.add_source(link) {
                warn!("Skipping proxy source: {}", e);
            }
        }

        manager
    }

    /// Register a source URL, replacing any source on the same hostname.
    pub fn add_source(&self, link: &str) -> Result<(), ProxyError> {
        let url = Url::parse(link).map_err(|e| ProxyError::InvalidSource(format!("{}: {}", link, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| ProxyError::InvalidSource(link.to_string()))?
            .to_string();

        if let Some(previous) = self.sources.write().insert(host, link.to_string()) {
            debug!("Replaced proxy source {} with {}", previous, link);
        }
        Ok(())
    }

    /// Registered source URLs.
    pub fn sources(&self) -> Vec<String> {
        self.sources.read().values().cloned().collect()
    }

    /// Pull proxies from the static list and every source, then requeue all
    /// known proxies in random order, each `threads_per_proxy` times.
    ///
    /// Returns the number of known proxies. Unreachable or malformed sources
    /// contribute nothing.
    pub async fn refresh(&self) -> usize {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_if_empty(&self) {
        let _guard = self.refresh_lock.lock().await;
        if self.queue.is_empty() {
            self.refresh_locked().await;
        } else {
            debug!("Queue refilled by a concurrent refresh");
        }
    }

    async fn refresh_locked(&self) -> usize {
        info!("Refreshing proxies...");
        let mut lot = self.admit(&self.static_proxies);

        let sources = self.sources();
        let fetches = sources.iter().map(|url| async move {
            match self.fetcher.fetch(url).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("Failed to fetch proxies from {}: {}", url, e);
                    Vec::new()
                }
            }
        });
        let results = future::join_all(fetches).await;

        for (url, candidates) in sources.iter().zip(results) {
            let admitted = self.admit(&candidates);
            debug!("Fetched {} proxies from {}", admitted.len(), url);
            lot.extend(admitted);
        }

        let mut proxies: Vec<Proxy> = {
            let mut known = self.known.lock();
            known.extend(lot);
            info!("Retrieved {} proxies", known.len());
            known.iter().cloned().collect()
        };
        proxies.shuffle(&mut rand::rng());

        for proxy in &proxies {
            for _ in 0..self.threads_per_proxy {
                self.queue.push(proxy.clone());
            }
        }
        proxies.len()
    }

    /// Turn candidates into proxies, keeping at most `max_proxies`.
    fn admit(&self, candidates: &[(String, String)]) -> Vec<Proxy> {
        candidates
            .iter()
            .filter_map(|(host, port)| match Proxy::from_parts(host, port) {
                Ok(proxy) => Some(proxy),
                Err(e) => {
                    debug!("Ignoring candidate: {}", e);
                    None
                }
            })
            .take(self.max_proxies)
            .collect()
    }

    /// Take a proxy from the queue, refreshing first if it is empty.
    ///
    /// Suspends the calling task until a proxy is available. Without an
    /// acquire timeout this waits indefinitely when every source is down and
    /// nothing is released.
    pub async fn acquire(&self) -> Result<Proxy, ProxyError> {
        if self.queue.is_empty() {
            self.refresh_if_empty().await;
        }

        debug!("Grabbing proxy from queue...");
        let proxy = match self.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, self.queue.pop())
                .await
                .map_err(|_| ProxyError::PoolExhausted(limit))?,
            None => self.queue.pop().await,
        };
        debug!("Grabbed proxy {} from queue", proxy);
        Ok(proxy)
    }

    /// Put a proxy back in the queue. Duplicates are not checked.
    pub fn release(&self, proxy: Proxy) {
        debug!("Proxy {} added back to queue", proxy);
        self.queue.push(proxy);
    }

    /// Record a proxy that failed at the transport layer.
    pub fn mark_bad(&self, proxy: &Proxy) {
        if self.bad.lock().insert(proxy.clone()) {
            warn!("Proxy {} marked bad", proxy);
        }
    }

    pub fn known_proxies(&self) -> HashSet<Proxy> {
        self.known.lock().clone()
    }

    pub fn bad_proxies(&self) -> HashSet<Proxy> {
        self.bad.lock().clone()
    }

    /// Number of queue slots currently available.
    pub fn available(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_order(&self) -> QueueOrder {
        self.queue.order()
    }
}
