//! HTTP transport used to issue requests through a proxy.

use crate::proxy::Proxy;

use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use log::debug;
use std::time::Duration;
use thiserror::Error;

/// A fully described request to send through one proxy.
#[derive(Debug, Clone)]
pub struct ProxiedRequest {
    pub method: Method,
    pub url: String,
    /// Query string parameters.
    pub query: Vec<(String, String)>,
    /// Form-encoded body, sent only when non-empty.
    pub form: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub timeout: Duration,
    pub proxy: Proxy,
}

/// Buffered response returned by a transport.
pub type HttpResponse = http::Response<Vec<u8>>;

/// How a transport call failed.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The proxy hop failed: connection refused, timeout, or proxy auth.
    #[error("proxy failure: {0}")]
    Proxy(String),
    /// Any other failure, not attributed to the proxy.
    #[error("remote failure: {0}")]
    Remote(String),
}

impl TransportError {
    /// Classify a reqwest error.
    pub fn classify(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            TransportError::Proxy(err.to_string())
        } else {
            TransportError::Remote(err.to_string())
        }
    }
}

/// Capability to execute HTTP requests routed through a given proxy.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: ProxiedRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by reqwest, building a client per proxied call.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient;

impl ReqwestClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: ProxiedRequest) -> Result<HttpResponse, TransportError> {
        let reqwest_proxy = request
            .proxy
            .to_reqwest_proxy()
            .map_err(|e| TransportError::Proxy(e.to_string()))?;

        let client = reqwest::Client::builder()
            .proxy(reqwest_proxy)
            .timeout(request.timeout)
            .build()
            .map_err(|e| TransportError::Remote(e.to_string()))?;

        let mut builder = client
            .request(request.method, request.url.as_str())
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }

        let response = builder.send().await.map_err(TransportError::classify)?;
        if response.status() == StatusCode::PROXY_AUTHENTICATION_REQUIRED {
            return Err(TransportError::Proxy(format!(
                "{} requires authentication",
                request.proxy
            )));
        }

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(TransportError::classify)?;
        debug!("{} bytes received via {}", body.len(), request.proxy);

        let mut out = http::Response::new(body.to_vec());
        *out.status_mut() = status;
        *out.version_mut() = version;
        *out.headers_mut() = headers;
        Ok(out)
    }
}
