//! Upstream connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! MultiplexPool::new
//!     → spawn ActiveClient construction (active_client.rs)
//!         create connection → build StreamClient → connect → keep-alive → publish
//!
//! ConnectionPool::new_stream
//!     → no active client: on_failure(ConnectionFailure)
//!     → budget exhausted: on_failure(Overflow)
//!     → admitted: StreamClient::new_stream → on_ready
//!
//! Connection/stream events
//!     → ActiveClient listeners
//!     → multiplex.rs reducers (counters, Active → Dead)
//!
//! Pool States:
//!     Connecting → Active → Dead
//!     Connecting → Dead
//! ```
//!
//! # Design Decisions
//! - One connection per host, multiplexed; never more than one active client
//! - Callers never wait for an in-flight connect; they fail fast
//! - Dead is terminal: recovery means building a new pool
//! - All state transitions go through one mutex, never held across collaborator calls

pub mod active_client;
pub mod keepalive;
pub mod multiplex;
pub mod registry;

use std::sync::Arc;

use crate::stream::{PoolEventListener, Protocol, StreamContext, StreamReceiveListener};

pub use active_client::ActiveClient;
pub use keepalive::{KeepAliveListener, KeepAliveProbe};
pub use multiplex::{DeadCause, MultiplexPool, MultiplexPoolFactory, PoolOptions, PoolStateKind};
pub use registry::{PoolFactory, PoolFactoryRegistry, RegistryError};

/// A pool of upstream connections for one host.
pub trait ConnectionPool: Send + Sync {
    /// Protocol this pool was registered for.
    fn protocol(&self) -> Protocol;

    /// True iff a connected client is installed.
    fn active(&self) -> bool;

    /// Open a new stream. The outcome is reported only through `listener`.
    fn new_stream(
        &self,
        ctx: &StreamContext,
        receiver: Arc<dyn StreamReceiveListener>,
        listener: &dyn PoolEventListener,
    );

    /// Close the pool's connection, if any.
    fn close(&self);
}
