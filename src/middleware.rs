//! Middleware implementation for reqwest.

use crate::broker::Lease;
use crate::config::ProxyPoolConfig;
use crate::error::{BadProxyError, ProxyError};
use crate::pool::ProxyManager;
use crate::transport::TransportError;

use anyhow::anyhow;
use async_trait::async_trait;
use log::{info, warn};
use reqwest_middleware::{Error, Middleware, Next, Result};
use std::sync::Arc;
use std::time::Duration;

/// Middleware that routes each request through a proxy from the pool.
///
/// The request is sent by a client built for the acquired proxy; the rest of
/// the middleware chain is not invoked. A bad-proxy failure surfaces as
/// `Error::Middleware` wrapping a [`BadProxyError`].
///
/// Successful responses carry the serving [`Proxy`](crate::Proxy) in their
/// extensions. Outside rotating mode, hand it back with
/// `manager().release(..)` once done with it.
#[derive(Clone)]
pub struct ProxyPoolMiddleware {
    /// The proxy pool.
    manager: Arc<ProxyManager>,
    timeout: Duration,
    rotating: bool,
}

impl ProxyPoolMiddleware {
    /// Create a new middleware and fill its pool once.
    pub async fn new(config: ProxyPoolConfig) -> Self {
        let manager = Arc::new(ProxyManager::new(&config));
        let count = manager.refresh().await;
        info!("Proxy pool initialized with {} proxies", count);
        if count == 0 {
            warn!("No proxies available in pool");
        }
        Self::with_manager(&config, manager)
    }

    /// Share an existing manager, e.g. one also used by a broker.
    pub fn with_manager(config: &ProxyPoolConfig, manager: Arc<ProxyManager>) -> Self {
        Self {
            manager,
            timeout: config.timeout,
            rotating: config.rotating,
        }
    }

    pub fn manager(&self) -> &Arc<ProxyManager> {
        &self.manager
    }
}

#[async_trait]
impl Middleware for ProxyPoolMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        _extensions: &mut http::Extensions,
        _next: Next<'_>,
    ) -> Result<reqwest::Response> {
        let proxy = self
            .manager
            .acquire()
            .await
            .map_err(|e| Error::Middleware(anyhow!(e)))?;
        info!("Using proxy: {}", proxy);
        let _lease = self.rotating.then(|| Lease::new(&self.manager, proxy.clone()));

        let outcome = match proxy.to_reqwest_proxy() {
            Ok(reqwest_proxy) => match reqwest::Client::builder()
                .proxy(reqwest_proxy)
                .timeout(self.timeout)
                .build()
            {
                Ok(client) => client.execute(req).await.map_err(TransportError::classify),
                Err(e) => Err(TransportError::Remote(e.to_string())),
            },
            Err(e) => Err(TransportError::Proxy(e.to_string())),
        };

        let outcome = match outcome {
            Ok(response) if response.status() == reqwest::StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
                Err(TransportError::Proxy(format!("{} requires authentication", proxy)))
            }
            other => other,
        };

        match outcome {
            Ok(mut response) => {
                response.extensions_mut().insert(proxy);
                Ok(response)
            }
            Err(TransportError::Proxy(message)) => {
                warn!("Request failed with proxy {}: {}", proxy, message);
                self.manager.mark_bad(&proxy);
                Err(Error::Middleware(anyhow!(BadProxyError::new(proxy, Some(message)))))
            }
            Err(TransportError::Remote(message)) => {
                Err(Error::Middleware(anyhow!(ProxyError::Request { proxy, message })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::Proxy;
    use reqwest_middleware::ClientBuilder;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    /// Minimal forward proxy answering every request with `200 ok`.
    async fn spawn_ok_proxy() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let _ = stream
                        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
                        .await;
                });
            }
        });
        port
    }

    fn config_for(port: u16) -> crate::config::ProxyPoolConfigBuilder {
        ProxyPoolConfig::builder()
            .free_sources(false)
            .proxies(vec![format!("127.0.0.1:{}", port)])
    }

    #[tokio::test]
    async fn test_response_carries_serving_proxy() {
        let port = spawn_ok_proxy().await;
        let middleware = ProxyPoolMiddleware::new(config_for(port).build()).await;
        let manager = middleware.manager().clone();

        let client = ClientBuilder::new(reqwest::Client::new()).with(middleware).build();
        let response = client.get("http://example.com/").send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let proxy = response.extensions().get::<Proxy>().cloned().unwrap();
        assert_eq!(proxy, Proxy::new("127.0.0.1", port).unwrap());
        assert_eq!(manager.available(), 0);

        manager.release(proxy);
        assert_eq!(manager.available(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_rotating_request_returns_proxy() {
        // accepts connections but never answers
        let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();
        let middleware = ProxyPoolMiddleware::new(config_for(port).rotating(true).build()).await;
        let manager = middleware.manager().clone();

        let client = ClientBuilder::new(reqwest::Client::new()).with(middleware).build();
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            client.get("http://example.com/").send(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(manager.available(), 1);
        drop(silent);
    }

    #[tokio::test]
    async fn test_unreachable_proxy_surfaces_bad_proxy() {
        let _ = env_logger::builder().is_test(true).try_init();
        let config = ProxyPoolConfig::builder()
            .free_sources(false)
            .proxies(vec![format!("127.0.0.1:{}", closed_port())])
            .rotating(true)
            .build();
        let middleware = ProxyPoolMiddleware::new(config).await;
        let manager = middleware.manager().clone();

        let client = ClientBuilder::new(reqwest::Client::new()).with(middleware).build();
        let err = client.get("http://example.com/").send().await.unwrap_err();

        match err {
            Error::Middleware(e) => assert!(e.downcast_ref::<BadProxyError>().is_some()),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(manager.bad_proxies().len(), 1);
        assert_eq!(manager.available(), 1);
    }
}
