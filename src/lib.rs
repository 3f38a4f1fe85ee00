//! Multiplexed upstream connection pool for a service-mesh data plane.
//!
//! One pool per upstream host owns a single multiplexed connection, admits
//! new request streams against the cluster's request budget, and turns
//! connection and stream events into pool state changes and counters.

pub mod config;
pub mod net;
pub mod observability;
pub mod pool;
pub mod stream;
pub mod upstream;

pub use config::PoolSettings;
pub use pool::{ConnectionPool, MultiplexPool, MultiplexPoolFactory, PoolFactoryRegistry, PoolOptions};
