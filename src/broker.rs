//! Request-facing surface: issue requests through pooled proxies.

use crate::config::ProxyPoolConfig;
use crate::error::{BadProxyError, ProxyError};
use crate::pool::ProxyManager;
use crate::proxy::Proxy;
use crate::session::Session;
use crate::transport::{HttpClient, HttpResponse, ProxiedRequest, ReqwestClient, TransportError};

use http::{HeaderMap, Method, StatusCode};
use log::{debug, info, warn};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

/// A response paired with the proxy that served it.
#[derive(Debug)]
pub struct ProxyResponse {
    proxy: Proxy,
    response: HttpResponse,
}

impl ProxyResponse {
    pub fn new(proxy: Proxy, response: HttpResponse) -> Self {
        Self { proxy, response }
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    pub fn body(&self) -> &[u8] {
        self.response.body()
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.response.body())
    }

    pub fn into_parts(self) -> (Proxy, HttpResponse) {
        (self.proxy, self.response)
    }
}

/// Per-call overrides of the broker defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Option<HeaderMap>,
    pub timeout: Option<Duration>,
}

/// Returns the proxy to the pool when dropped, even if the call was cancelled.
pub(crate) struct Lease<'a> {
    manager: &'a ProxyManager,
    proxy: Option<Proxy>,
}

impl<'a> Lease<'a> {
    pub(crate) fn new(manager: &'a ProxyManager, proxy: Proxy) -> Self {
        Self {
            manager,
            proxy: Some(proxy),
        }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(proxy) = self.proxy.take() {
            self.manager.release(proxy);
        }
    }
}

/// Issues requests through proxies checked out of a [`ProxyManager`].
///
/// A bad-proxy failure is reported as [`ProxyError::BadProxy`]; retrying
/// with another proxy is left to the caller. In rotating mode every proxy
/// goes back to the pool as soon as its call finishes.
pub struct ProxyBroker {
    manager: Arc<ProxyManager>,
    client: Arc<dyn HttpClient>,
    headers: HeaderMap,
    timeout: Duration,
    rotating: bool,
    clear_on_fail: bool,
}

impl ProxyBroker {
    /// Create a broker backed by reqwest and fill the pool once.
    pub async fn new(config: ProxyPoolConfig) -> Self {
        let manager = Arc::new(ProxyManager::new(&config));
        let broker = Self::from_parts(&config, manager, Arc::new(ReqwestClient::new()));

        let count = broker.manager.refresh().await;
        if count == 0 {
            warn!("No proxies available after initial refresh");
        } else {
            info!("Proxy broker initialized with {} proxies", count);
        }
        broker
    }

    /// Assemble a broker from an existing manager and transport.
    pub fn from_parts(
        config: &ProxyPoolConfig,
        manager: Arc<ProxyManager>,
        client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            manager,
            client,
            headers: config.headers.clone(),
            timeout: config.timeout,
            rotating: config.rotating,
            clear_on_fail: config.clear_on_fail,
        }
    }

    pub fn manager(&self) -> &Arc<ProxyManager> {
        &self.manager
    }

    /// GET `url` with query `params` through a pooled proxy.
    pub async fn get(
        &self,
        url: &str,
        params: &[(&str, &str)],
        options: RequestOptions,
    ) -> Result<ProxyResponse, ProxyError> {
        let proxy = self.manager.acquire().await?;
        let headers = options.headers.unwrap_or_else(|| self.headers.clone());
        let request = self.request(Method::GET, url, params, &[], headers, options.timeout, &proxy);
        self.send(proxy, request).await
    }

    /// POST form `data` to `url` through a pooled proxy.
    pub async fn post(
        &self,
        url: &str,
        data: &[(&str, &str)],
        options: RequestOptions,
    ) -> Result<ProxyResponse, ProxyError> {
        let proxy = self.manager.acquire().await?;
        let headers = options.headers.unwrap_or_else(|| self.headers.clone());
        let request = self.request(Method::POST, url, &[], data, headers, options.timeout, &proxy);
        self.send(proxy, request).await
    }

    /// GET through the session's bound proxy, binding one first if needed.
    pub async fn session_get(
        &self,
        session: &mut Session,
        url: &str,
        params: &[(&str, &str)],
        options: RequestOptions,
    ) -> Result<ProxyResponse, ProxyError> {
        let proxy = self.bind(session).await?;
        let headers = self.session_headers(session, options.headers);
        let request = self.request(Method::GET, url, params, &[], headers, options.timeout, &proxy);
        self.send_with_session(session, proxy, request).await
    }

    /// POST through the session's bound proxy, binding one first if needed.
    pub async fn session_post(
        &self,
        session: &mut Session,
        url: &str,
        data: &[(&str, &str)],
        options: RequestOptions,
    ) -> Result<ProxyResponse, ProxyError> {
        let proxy = self.bind(session).await?;
        let headers = self.session_headers(session, options.headers);
        let request = self.request(Method::POST, url, &[], data, headers, options.timeout, &proxy);
        self.send_with_session(session, proxy, request).await
    }

    /// Return a proxy to the pool.
    pub fn release(&self, proxy: Proxy) {
        self.manager.release(proxy);
    }

    async fn bind(&self, session: &mut Session) -> Result<Proxy, ProxyError> {
        if let Some(proxy) = session.bound_proxy() {
            return Ok(proxy);
        }
        let proxy = self.manager.acquire().await?;
        debug!("Binding proxy {} to session", proxy);
        session.set_proxies(proxy.as_map());
        Ok(proxy)
    }

    fn session_headers(&self, session: &Session, headers: Option<HeaderMap>) -> HeaderMap {
        match headers {
            Some(headers) => headers,
            None if !session.headers().is_empty() => session.headers().clone(),
            None => self.headers.clone(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn request(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        form: &[(&str, &str)],
        headers: HeaderMap,
        timeout: Option<Duration>,
        proxy: &Proxy,
    ) -> ProxiedRequest {
        let owned = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>()
        };
        ProxiedRequest {
            method,
            url: url.to_string(),
            query: owned(query),
            form: owned(form),
            headers,
            timeout: timeout.unwrap_or(self.timeout),
            proxy: proxy.clone(),
        }
    }

    async fn send(&self, proxy: Proxy, request: ProxiedRequest) -> Result<ProxyResponse, ProxyError> {
        let _lease = self.rotating.then(|| Lease::new(&self.manager, proxy.clone()));
        match self.client.execute(request).await {
            Ok(response) => Ok(ProxyResponse::new(proxy, response)),
            Err(err) => Err(self.fail(proxy, err)),
        }
    }

    async fn send_with_session(
        &self,
        session: &mut Session,
        proxy: Proxy,
        request: ProxiedRequest,
    ) -> Result<ProxyResponse, ProxyError> {
        let _lease = self.rotating.then(|| Lease::new(&self.manager, proxy.clone()));
        match self.client.execute(request).await {
            Ok(response) => Ok(ProxyResponse::new(proxy, response)),
            Err(err) => {
                if self.clear_on_fail && matches!(err, TransportError::Proxy(_)) {
                    debug!("Clearing proxy {} from session", proxy);
                    session.clear_proxies();
                }
                Err(self.fail(proxy, err))
            }
        }
    }

    fn fail(&self, proxy: Proxy, err: TransportError) -> ProxyError {
        match err {
            TransportError::Proxy(message) => {
                self.manager.mark_bad(&proxy);
                BadProxyError::new(proxy, Some(message)).into()
            }
            TransportError::Remote(message) => ProxyError::Request { proxy, message },
        }
    }
}
