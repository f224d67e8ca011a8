//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the forwarding proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single upstream API requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration, per logical route.
    pub timeouts: TimeoutConfig,

    /// Endpoint naming rules.
    pub routing: RoutingConfig,

    /// Response relay policies.
    pub relay: RelayConfig,

    /// Inbound request limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
        }
    }
}

/// How ordinary field submissions are re-encoded for the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamEncoding {
    /// JSON text with an explicit Content-Length.
    #[default]
    Json,
    /// `application/x-www-form-urlencoded` with flat bracket keys.
    Form,
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL, without the forwarded path (e.g., "https://app.veez.ai").
    pub base_url: String,

    /// Bearer token injected when the caller sends no Authorization header.
    pub token: String,

    /// User-Agent sent on every outbound call.
    pub user_agent: String,

    /// Path prefix the proxy forwards (and keeps) when calling the upstream.
    pub api_prefix: String,

    /// Re-encoding used for JSON and url-encoded inbound bodies.
    pub encoding: UpstreamEncoding,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://app.veez.ai".to_string(),
            token: String::new(),
            user_agent: "VeezProxy/1.0".to_string(),
            api_prefix: "/api".to_string(),
            encoding: UpstreamEncoding::Json,
        }
    }
}

impl UpstreamConfig {
    /// Whether a proxy-held credential is available.
    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total upstream call timeout in seconds for ordinary routes.
    pub default_secs: u64,

    /// Per-collection overrides, e.g. long-running generation endpoints.
    pub routes: BTreeMap<String, u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        let mut routes = BTreeMap::new();
        routes.insert("prediction".to_string(), 300);
        Self {
            connect_secs: 10,
            default_secs: 60,
            routes,
        }
    }
}

impl TimeoutConfig {
    /// Deadline for a call to the given collection (or the default).
    pub fn for_collection(&self, collection: Option<&str>) -> Duration {
        let secs = collection
            .and_then(|name| self.routes.get(name))
            .copied()
            .unwrap_or(self.default_secs);
        Duration::from_secs(secs)
    }
}

/// Endpoint naming configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Collection endpoints that need a trailing slash when addressed
    /// without a resource identifier.
    pub collections: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            collections: vec![
                "product".to_string(),
                "template".to_string(),
                "prediction".to_string(),
            ],
        }
    }
}

/// Response relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Translate an empty 5xx upstream body into a "processing" success.
    pub empty_server_error_as_processing: bool,

    /// Maximum characters of an upstream body kept for diagnostics.
    pub preview_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            empty_server_error_as_processing: true,
            preview_bytes: 300,
        }
    }
}

/// Inbound request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
