//! Stateful session that keeps a proxy bound across calls.

use crate::proxy::{Proxy, ProxyMap};

use http::HeaderMap;

/// A session carrying its own headers and, once bound, a proxy mapping.
///
/// The broker binds a pool proxy on first use and keeps routing the
/// session's requests through it until it is cleared.
#[derive(Debug, Clone, Default)]
pub struct Session {
    proxies: ProxyMap,
    headers: HeaderMap,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headers(headers: HeaderMap) -> Self {
        Self {
            proxies: ProxyMap::new(),
            headers,
        }
    }

    pub fn proxies(&self) -> &ProxyMap {
        &self.proxies
    }

    /// Merge a proxy mapping into the session's configuration.
    pub fn set_proxies(&mut self, proxies: ProxyMap) {
        self.proxies.extend(proxies);
    }

    pub fn clear_proxies(&mut self) {
        self.proxies.clear();
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The proxy currently bound, taken from the last protocol entry.
    pub fn bound_proxy(&self) -> Option<Proxy> {
        self.proxies
            .values()
            .next_back()
            .and_then(|url| Proxy::from_url(url).ok())
    }
}
