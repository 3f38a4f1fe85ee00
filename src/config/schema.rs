//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the upstream pool subsystem.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PoolSettings {
    /// Connection keep-alive probing.
    pub keepalive: KeepAliveConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Upstream clusters and their admission budgets.
    pub clusters: Vec<ClusterConfig>,
}

/// Keep-alive probe configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct KeepAliveConfig {
    /// Time allowed for a heartbeat ack, in milliseconds.
    pub interval_ms: u64,

    /// Consecutive unanswered heartbeats tolerated before the connection is
    /// declared unhealthy.
    pub max_retries: u32,
}

impl KeepAliveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_retries: 6,
        }
    }
}

/// Upstream cluster definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Unique cluster name, used as the metrics label.
    pub name: String,

    /// Maximum concurrent requests admitted across the cluster.
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,
}

fn default_max_requests() -> u64 {
    1024
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = PoolSettings::default();
        assert_eq!(settings.keepalive.interval(), Duration::from_secs(1));
        assert_eq!(settings.keepalive.max_retries, 6);
        assert!(settings.clusters.is_empty());
        assert_eq!(settings.observability.log_level, "info");
    }

    #[test]
    fn parse_partial_toml() {
        let settings: PoolSettings = toml::from_str(
            r#"
            [keepalive]
            interval_ms = 250

            [[clusters]]
            name = "rpc"

            [[clusters]]
            name = "batch"
            max_requests = 8
            "#,
        )
        .unwrap();

        assert_eq!(settings.keepalive.interval_ms, 250);
        assert_eq!(settings.keepalive.max_retries, 6);
        assert_eq!(settings.clusters.len(), 2);
        assert_eq!(settings.clusters[0].max_requests, 1024);
        assert_eq!(settings.clusters[1].max_requests, 8);
    }
}
