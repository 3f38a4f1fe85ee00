//! Transport connection contract and lifecycle events.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Define the events a transport connection reports
//! - Define the capability surface the pool consumes from a connection

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Events reported by a transport connection to its listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Handshake completed.
    Connected,
    /// Connection closed by this side.
    LocalClose,
    /// Connection closed by the peer.
    RemoteClose,
    /// Handshake did not complete within the transport's deadline.
    ConnectTimeout,
    /// Handshake failed.
    ConnectFailed,
    /// No bytes read within the idle window.
    ReadTimeout,
    /// A write did not complete within the write window.
    WriteTimeout,
}

impl ConnectionEvent {
    /// True for `LocalClose` and `RemoteClose`.
    pub fn is_close(&self) -> bool {
        matches!(self, ConnectionEvent::LocalClose | ConnectionEvent::RemoteClose)
    }

    /// True for `ConnectTimeout` and `ConnectFailed`.
    pub fn connect_failure(&self) -> bool {
        matches!(self, ConnectionEvent::ConnectTimeout | ConnectionEvent::ConnectFailed)
    }

    /// True for every event after which the connection is unusable.
    pub fn is_terminal(&self) -> bool {
        self.is_close() || self.connect_failure()
    }
}

impl std::fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionEvent::Connected => "Connected",
            ConnectionEvent::LocalClose => "LocalClose",
            ConnectionEvent::RemoteClose => "RemoteClose",
            ConnectionEvent::ConnectTimeout => "ConnectTimeout",
            ConnectionEvent::ConnectFailed => "ConnectFailed",
            ConnectionEvent::ReadTimeout => "ReadTimeout",
            ConnectionEvent::WriteTimeout => "WriteTimeout",
        };
        f.write_str(name)
    }
}

/// How a close should treat pending writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseType {
    /// Flush pending writes, then close.
    FlushWrite,
    /// Drop pending writes and close immediately.
    NoFlush,
}

/// Errors surfaced by transport collaborators.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Peer refused the connection.
    #[error("connection refused: {0}")]
    Refused(String),

    /// Handshake did not complete in time.
    #[error("connect timed out")]
    Timeout,

    /// Connection already closed.
    #[error("connection closed")]
    Closed,

    /// Heartbeat could not be written or was rejected.
    #[error("heartbeat failed: {0}")]
    Heartbeat(String),

    /// Underlying socket error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives connection-level events.
pub trait ConnectionEventListener: Send + Sync {
    fn on_event(&self, event: ConnectionEvent);
}

/// A transport connection to one upstream host.
///
/// Implementations are expected to fan events out to every registered
/// listener, in registration order, on whatever task drives their I/O.
pub trait Connection: Send + Sync {
    /// Identifier used in logs and codec contexts.
    fn id(&self) -> ConnectionId;

    /// Perform the connect handshake, resolving once it completes or fails.
    fn connect(&self) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Close the connection. Calling this on a closed connection is a no-op.
    fn close(&self, close_type: CloseType);

    fn add_connection_event_listener(&self, listener: Arc<dyn ConnectionEventListener>);
}
