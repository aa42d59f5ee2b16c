//! Configuration for the host bridge
//!
//! Wire constants live in [`endpoints`], reconnect tunables in [`resilience`].
//! [`BridgeConfig`] gathers what a hosted-mode bridge needs at construction.

pub mod endpoints;
pub mod resilience;

use std::path::PathBuf;

use crate::core::DATA_DIR;
use endpoints::{
    DEFAULT_HOST_PORT, HOST_URL_ENV, LOOPBACK_HOST, PAGE_HOST_ENV, TOKEN_IN_QUERY_ENV,
};
use resilience::RetryPolicy;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Host bridge origin without a trailing slash, e.g. `http://127.0.0.1:48678`.
    pub base_url: String,
    /// Carry the token in the push-stream query string. When false the stream
    /// URL is tokenless and the credential travels in headers only.
    pub token_in_query: bool,
    pub reconnect: RetryPolicy,
    /// Directory holding durable client state (the persisted token).
    pub data_dir: PathBuf,
}

impl BridgeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            token_in_query: true,
            reconnect: RetryPolicy::default(),
            data_dir: DATA_DIR.clone(),
        }
    }

    /// Resolve everything from the process environment.
    ///
    /// Environment variables:
    /// - SYMPHONY_HOST_URL: explicit host origin, wins over everything else
    /// - SYMPHONY_PAGE_HOST: hostname the client was served from
    /// - SYMPHONY_EVENTS_TOKEN_IN_QUERY: `0` selects the tokenless stream URL
    /// - SYMPHONY_EVENTS_RECONNECT_*: see [`RetryPolicy::from_env`]
    pub fn from_env() -> Self {
        let override_url = std::env::var(HOST_URL_ENV).ok();
        let page_host = std::env::var(PAGE_HOST_ENV).ok();
        let mut config = Self::new(resolve_base_url(
            override_url.as_deref(),
            page_host.as_deref(),
        ));
        config.token_in_query = std::env::var(TOKEN_IN_QUERY_ENV)
            .map(|v| v.trim() != "0")
            .unwrap_or(true);
        config.reconnect = RetryPolicy::from_env();
        config
    }

    pub fn with_reconnect(mut self, policy: RetryPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_token_in_query(mut self, enabled: bool) -> Self {
        self.token_in_query = enabled;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Pick the host origin: explicit override, then the page host on the
/// default port, then loopback.
pub fn resolve_base_url(override_url: Option<&str>, page_host: Option<&str>) -> String {
    if let Some(url) = override_url.map(str::trim).filter(|u| !u.is_empty()) {
        return normalize_base_url(url);
    }
    let host = page_host
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or(LOOPBACK_HOST);
    if host.contains(':') && !host.starts_with('[') {
        return format!("http://[{host}]:{DEFAULT_HOST_PORT}");
    }
    format!("http://{host}:{DEFAULT_HOST_PORT}")
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_and_is_trimmed() {
        assert_eq!(
            resolve_base_url(Some("  https://bridge.example:9000/ "), Some("ignored")),
            "https://bridge.example:9000"
        );
    }

    #[test]
    fn blank_override_falls_through_to_page_host() {
        assert_eq!(
            resolve_base_url(Some("   "), Some("devbox.local")),
            "http://devbox.local:48678"
        );
    }

    #[test]
    fn loopback_when_no_page_context() {
        assert_eq!(resolve_base_url(None, None), "http://127.0.0.1:48678");
        assert_eq!(resolve_base_url(None, Some("")), "http://127.0.0.1:48678");
    }

    #[test]
    fn ipv6_page_host_is_bracketed() {
        assert_eq!(resolve_base_url(None, Some("::1")), "http://[::1]:48678");
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = BridgeConfig::new("http://host:1/");
        assert_eq!(config.endpoint("/api/invoke"), "http://host:1/api/invoke");
        assert!(config.token_in_query);
    }
}
