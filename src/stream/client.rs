//! Codec-bound stream multiplexer contract.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::net::{Connection, ConnectionEventListener, TransportError};
use crate::upstream::{Counter, Gauge, HostInfo};

use super::types::{
    Protocol, StreamConnectionEventListener, StreamContext, StreamEventListener,
    StreamReceiveListener, StreamResetReason, SubProtocol,
};

/// One logical stream on a multiplexed connection.
pub trait Stream: Send + Sync {
    fn id(&self) -> u64;
    fn add_event_listener(&self, listener: Arc<dyn StreamEventListener>);
    fn reset_stream(&self, reason: StreamResetReason);
}

/// Request side of a stream, handed to the upper layer on `on_ready`.
pub trait StreamSender: Send + Sync {
    fn get_stream(&self) -> &dyn Stream;
}

/// Byte-accounting handles installed on a stream client.
///
/// Totals are shared across every connection of a cluster; buffered gauges
/// belong to one connection.
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub read_total: Arc<Counter>,
    pub read_buffered: Arc<Gauge>,
    pub write_total: Arc<Counter>,
    pub write_buffered: Arc<Gauge>,
}

/// Turns one transport connection into a stream-opening facility.
pub trait StreamClient: Send + Sync {
    /// Open a new stream whose responses go to `receiver`.
    fn new_stream(
        &self,
        ctx: &StreamContext,
        receiver: Arc<dyn StreamReceiveListener>,
    ) -> Arc<dyn StreamSender>;

    fn add_connection_event_listener(&self, listener: Arc<dyn ConnectionEventListener>);

    fn set_stream_connection_event_listener(
        &self,
        listener: Arc<dyn StreamConnectionEventListener>,
    );

    fn set_connection_stats(&self, stats: ConnectionStats);

    /// Close the underlying connection. Must tolerate repeated calls.
    fn close(&self);

    /// Write one heartbeat frame; resolves when the peer acknowledges it.
    fn send_heartbeat(
        &self,
        sub_protocol: SubProtocol,
    ) -> BoxFuture<'static, Result<(), TransportError>>;
}

/// Builds stream clients for a protocol. Supplied by the codec layer.
pub trait StreamClientFactory: Send + Sync {
    fn create(
        &self,
        protocol: Protocol,
        ctx: &StreamContext,
        connection: Arc<dyn Connection>,
        host_info: HostInfo,
    ) -> Arc<dyn StreamClient>;
}
