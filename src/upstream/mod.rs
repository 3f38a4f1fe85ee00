//! Upstream host and cluster subsystem.
//!
//! # Data Flow
//! ```text
//! Pool needs a connection
//!     → host.rs (Host::create_connection)
//! Pool admits a request
//!     → resource.rs (ResourceManager::requests: can_create/increase/decrease)
//! Pool observes an event
//!     → stats.rs (host counters, mirrored at cluster level)
//! ```
//!
//! # Design Decisions
//! - Hosts, clusters and budgets are owned elsewhere; pools hold shared handles
//! - Every counter exists at host and cluster granularity
//! - Budgets are shared across pools, so they are atomic

pub mod host;
pub mod resource;
pub mod stats;

pub use host::{ClusterInfo, CreateConnectionData, Host, HostInfo, StaticCluster};
pub use resource::{RequestBudget, Resource, ResourceManager};
pub use stats::{ClusterStats, Counter, Gauge, StatsScope, StatsSnapshot, UpstreamStats};
