//! # reqwest-proxy-broker
//!
//! A rotating pool of free HTTP proxies for reqwest.
//!
//! Proxies are scraped from public proxy lists (or supplied up front), queued,
//! and checked out one request at a time. A [`ProxyBroker`] acquires a proxy,
//! sends the request through it, and reports transport failures of the proxy
//! hop as [`BadProxyError`]. In rotating mode every proxy goes straight back
//! to the pool after use.

pub mod broker;
pub mod config;
pub mod error;
pub mod format;
pub mod middleware;
pub mod pool;
pub mod proxy;
pub mod queue;
pub mod session;
pub mod source;
pub mod transport;

pub use broker::{ProxyBroker, ProxyResponse, RequestOptions};
pub use config::{ProxyPoolConfig, ProxyPoolConfigBuilder};
pub use error::{BadProxyError, FetchError, ProxyError};
pub use format::format_proxies;
pub use middleware::ProxyPoolMiddleware;
pub use pool::ProxyManager;
pub use proxy::{Proxy, ProxyMap};
pub use queue::{ProxyQueue, QueueOrder};
pub use session::Session;
pub use source::{HttpSourceFetcher, SourceFetcher, FREE_SOURCES};
pub use transport::{HttpClient, HttpResponse, ProxiedRequest, ReqwestClient, TransportError};
