//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the HTTP relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, admission limit).
    pub listener: ListenerConfig,

    /// Relay endpoint behaviour.
    pub relay: RelaySettings,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Target, method and content-type policy.
    pub policy: PolicyConfig,

    /// Outbound client tuning.
    pub transport: TransportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum requests admitted concurrently (backpressure).
    pub max_in_flight: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_in_flight: 10_000,
        }
    }
}

/// Relay endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Path the relay endpoint is mounted on.
    pub path: String,

    /// Name of the parameter carrying the target URL.
    pub target_param: String,

    /// Externally visible URL of the relay endpoint, used for
    /// self-referencing redirects. Derived from each request when unset.
    pub public_url: Option<String>,

    /// Rewrite upstream redirects so they route back through the relay.
    pub rewrite_redirects: bool,

    /// Add X-Forwarded-For/Host/Proto to outbound requests.
    pub forwarded_headers: bool,

    /// Body chunks buffered between upstream and caller.
    pub stream_buffer_chunks: usize,

    /// Largest form-encoded body inspected for a target parameter.
    pub form_buffer_limit: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            path: "/proxy".to_string(),
            target_param: "url".to_string(),
            public_url: None,
            rewrite_redirects: true,
            forwarded_headers: false,
            stream_buffer_chunks: 16,
            form_buffer_limit: 64 * 1024,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed until the upstream response head arrives, in seconds.
    pub request_secs: u64,

    /// Longest gap between two upstream body chunks, in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            idle_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

/// Allow/deny policy applied to every relay operation.
///
/// Empty allow lists mean "allow everything".
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    /// Target hosts that may be reached. Supports `*.example.com`.
    pub allowed_hosts: Vec<String>,

    /// Target hosts that are always refused. Takes precedence.
    pub denied_hosts: Vec<String>,

    /// Regular expressions; the full target URL must match one of them.
    pub allowed_url_patterns: Vec<String>,

    /// HTTP methods callers may relay.
    pub allowed_methods: Vec<String>,

    /// Response content types relayed back (`type/subtype` or `type/*`).
    pub allowed_content_types: Vec<String>,
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Idle pooled connections kept per upstream host.
    pub pool_max_idle_per_host: usize,

    /// Seconds an idle pooled connection is kept.
    pub pool_idle_secs: u64,

    /// User-Agent sent when the caller provides none.
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 32,
            pool_idle_secs: 90,
            user_agent: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("text" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config.relay.path, "/proxy");
        assert_eq!(config.relay.target_param, "url");
        assert!(config.relay.rewrite_redirects);
        assert_eq!(config.timeouts.request_secs, 30);
    }

    #[test]
    fn test_partial_sections() {
        let raw = r#"
            [relay]
            public_url = "http://proxy.example/relay"

            [policy]
            denied_hosts = ["internal.example"]
        "#;
        let config: RelayConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.relay.public_url.as_deref(), Some("http://proxy.example/relay"));
        assert_eq!(config.relay.stream_buffer_chunks, 16);
        assert_eq!(config.policy.denied_hosts, vec!["internal.example".to_string()]);
        assert!(config.policy.allowed_hosts.is_empty());
    }
}
