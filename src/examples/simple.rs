//! Simple example of using reqwest-proxy-broker.

use reqwest_proxy_broker::{ProxyBroker, ProxyError, ProxyPoolConfig, RequestOptions};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Initializing proxy pool...");

    let config = ProxyPoolConfig::builder()
        // extra plain-text list on top of the built-in free sources
        .links(vec![
            "https://cdn.jsdelivr.net/gh/proxifly/free-proxy-list@main/proxies/protocols/http/data.txt",
        ])
        .timeout(Duration::from_secs(5))
        .threads_per_proxy(2)
        // give up instead of waiting forever when every source is down
        .acquire_timeout(Duration::from_secs(30))
        .rotating(true)
        .build();

    let broker = ProxyBroker::new(config).await;

    for attempt in 1..=5 {
        println!("Sending request (attempt {})...", attempt);
        match broker.get("http://httpbin.org/ip", &[], RequestOptions::default()).await {
            Ok(response) => {
                println!("Proxy: {}", response.proxy());
                println!("Status: {}", response.status());
                println!("Response: {}", response.text());
                return Ok(());
            }
            Err(ProxyError::BadProxy(bad)) => println!("{}, retrying", bad),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
