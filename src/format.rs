//! Extraction of `host:port` pairs from free-form proxy list text.

use regex::Regex;
use std::sync::LazyLock;

static HOST_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w\-]+\.[\w.-]+)").expect("valid host pattern"));

static PROXY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w\-]+\.[\w.-]+):(\d+)").expect("valid proxy pattern"));

/// Parse raw source text into candidate `(host, port)` pairs.
///
/// Hostname-like tokens are first prefixed with `http://` so bare hosts and
/// full URLs are matched the same way. Pairs are returned in order of
/// appearance and may repeat; callers merge them into a set. Ports are not
/// range-checked here, see [`Proxy::from_parts`](crate::Proxy::from_parts).
pub fn format_proxies(text: &str) -> Vec<(String, String)> {
    let normalized = HOST_PATTERN.replace_all(text, "http://$1");
    PROXY_PATTERN
        .captures_iter(&normalized)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}
