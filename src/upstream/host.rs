//! Host and cluster contracts consumed by the pool.

use std::sync::Arc;

use crate::config::ClusterConfig;
use crate::net::Connection;
use crate::stream::StreamContext;
use crate::upstream::resource::ResourceManager;
use crate::upstream::stats::{ClusterStats, UpstreamStats};

/// Descriptive data about a host, handed to codecs alongside the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// Upstream address, e.g. "10.0.0.7:12200".
    pub address: String,
    /// Owning cluster name.
    pub cluster: String,
}

/// A freshly created, not yet connected, transport connection.
#[derive(Clone)]
pub struct CreateConnectionData {
    pub connection: Arc<dyn Connection>,
    pub host_info: HostInfo,
}

/// Cluster-level view shared by every host in the cluster.
pub trait ClusterInfo: Send + Sync {
    fn name(&self) -> &str;
    fn stats(&self) -> &ClusterStats;
    fn resource_manager(&self) -> &ResourceManager;
}

/// One upstream backend.
pub trait Host: Send + Sync {
    fn address(&self) -> &str;

    /// Create a transport connection scoped to `ctx`. The connection is not
    /// connected yet.
    fn create_connection(&self, ctx: &StreamContext) -> CreateConnectionData;

    fn host_stats(&self) -> &UpstreamStats;

    fn cluster_info(&self) -> Arc<dyn ClusterInfo>;

    fn host_info(&self) -> HostInfo {
        HostInfo {
            address: self.address().to_string(),
            cluster: self.cluster_info().name().to_string(),
        }
    }
}

/// A cluster whose limits come straight from configuration.
#[derive(Debug)]
pub struct StaticCluster {
    name: String,
    stats: ClusterStats,
    resource_manager: ResourceManager,
}

impl StaticCluster {
    pub fn new(name: impl Into<String>, resource_manager: ResourceManager) -> Self {
        let name = name.into();
        Self {
            stats: ClusterStats::new(name.clone()),
            name,
            resource_manager,
        }
    }

    pub fn from_config(config: &ClusterConfig) -> Self {
        Self::new(
            config.name.clone(),
            ResourceManager::with_max_requests(config.max_requests),
        )
    }
}

impl ClusterInfo for StaticCluster {
    fn name(&self) -> &str {
        &self.name
    }

    fn stats(&self) -> &ClusterStats {
        &self.stats
    }

    fn resource_manager(&self) -> &ResourceManager {
        &self.resource_manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_cluster_from_config() {
        let config = ClusterConfig {
            name: "payments".into(),
            max_requests: 3,
        };
        let cluster = StaticCluster::from_config(&config);
        assert_eq!(cluster.name(), "payments");
        assert_eq!(cluster.resource_manager().requests().max(), 3);
        assert_eq!(cluster.stats().snapshot().request_active, 0);
    }
}
