//! Stream-level types shared by the pool and its codec collaborators.

use std::sync::Arc;

use crate::net::{ConnectionId, TransportError};
use crate::upstream::Host;

use super::client::StreamSender;

/// Application protocol a pool speaks to its upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http1,
    Http2,
    SofaRpc,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http1 => "Http1",
            Protocol::Http2 => "Http2",
            Protocol::SofaRpc => "SofaRpc",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codec sub-protocol byte detected on the downstream side. Its presence on
/// the bootstrap context enables connection keep-alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubProtocol(pub u8);

/// Request-scoped values passed down to hosts and codecs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamContext {
    pub connection_id: Option<ConnectionId>,
    pub sub_protocol: Option<SubProtocol>,
}

impl StreamContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sub_protocol(mut self, sub_protocol: SubProtocol) -> Self {
        self.sub_protocol = Some(sub_protocol);
        self
    }

    pub fn with_connection_id(mut self, id: ConnectionId) -> Self {
        self.connection_id = Some(id);
        self
    }
}

/// Why a stream was reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamResetReason {
    /// The underlying connection went away under the stream.
    ConnectionTermination,
    /// The underlying connection could not be established.
    ConnectionFailed,
    /// Reset by this side.
    LocalReset,
    /// Reset by the peer.
    RemoteReset,
    /// Rejected by a codec-level limit.
    Overflow,
}

/// Why the pool could not hand out a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolFailureReason {
    /// No usable connection.
    ConnectionFailure,
    /// Admission budget exhausted.
    Overflow,
}

impl std::fmt::Display for PoolFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolFailureReason::ConnectionFailure => f.write_str("ConnectionFailure"),
            PoolFailureReason::Overflow => f.write_str("Overflow"),
        }
    }
}

/// Receives response frames for a stream. Owned by the caller of
/// `new_stream` and handed through to the codec untouched.
pub trait StreamReceiveListener: Send + Sync {
    fn on_receive(&self, frame: &[u8], end_stream: bool);
    fn on_decode_error(&self, err: &TransportError);
}

/// Lifecycle notifications for a single stream.
pub trait StreamEventListener: Send + Sync {
    fn on_reset_stream(&self, reason: StreamResetReason);
    /// Delivered exactly once, after the stream is finished or reset.
    fn on_destroy_stream(&self);
}

/// Codec-level connection notifications.
pub trait StreamConnectionEventListener: Send + Sync {
    fn on_go_away(&self);
}

/// Outcome callbacks for `ConnectionPool::new_stream`.
pub trait PoolEventListener: Send + Sync {
    fn on_ready(&self, sender: Arc<dyn StreamSender>, host: Arc<dyn Host>);
    fn on_failure(&self, reason: PoolFailureReason, host: Option<Arc<dyn Host>>);
}
