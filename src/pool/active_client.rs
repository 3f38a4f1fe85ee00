//! The pool's wrapper around one live upstream connection.
//!
//! # Responsibilities
//! - Create, wire up and connect the transport connection and its stream client
//! - Start keep-alive probing when the bootstrap context asks for it
//! - Listen for connection, stream and codec events and forward them to the pool
//!
//! # Design Decisions
//! - Connection-level listeners hold the client weakly so the codec never
//!   keeps it alive; stream listeners hold it strongly so every destroy is
//!   delivered
//! - Teardown runs once, whichever of event, close or drop gets there first

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::net::{ConnectionEvent, ConnectionEventListener, ConnectionId, TransportError};
use crate::stream::{
    ConnectionStats, StreamClient, StreamConnectionEventListener, StreamContext,
    StreamEventListener, StreamReceiveListener, StreamResetReason, StreamSender,
};
use crate::upstream::{CreateConnectionData, Gauge};

use super::keepalive::{KeepAliveListener, KeepAliveProbe};
use super::multiplex::{DeadCause, PoolCore};

const GAUGE_UNCOUNTED: u8 = 0;
const GAUGE_COUNTED: u8 = 1;
const GAUGE_RELEASED: u8 = 2;

/// One connected upstream client owned by a pool.
pub struct ActiveClient {
    pool: Arc<PoolCore>,
    client: Arc<dyn StreamClient>,
    connection: CreateConnectionData,
    close_with_active_req: AtomicBool,
    total_stream: AtomicU64,
    in_flight: AtomicU64,
    keep_alive: OnceLock<Arc<KeepAliveListener>>,
    /// Whether this client currently holds a unit of `connection_active`.
    connection_gauge: AtomicU8,
    retired: OnceLock<DeadCause>,
    torn_down: AtomicBool,
}

impl ActiveClient {
    /// Create and connect a client. Single attempt: a failed handshake is
    /// returned to the caller and never retried here.
    pub(crate) async fn establish(
        pool: Arc<PoolCore>,
        ctx: &StreamContext,
    ) -> Result<Arc<Self>, TransportError> {
        let data = pool.host.create_connection(ctx);
        let connection_id = data.connection.id();
        let codec_ctx = StreamContext::new().with_connection_id(connection_id);
        let client = pool.codecs.create(
            pool.protocol,
            &codec_ctx,
            data.connection.clone(),
            data.host_info.clone(),
        );

        let ac = Arc::new(Self {
            pool: pool.clone(),
            client: client.clone(),
            connection: data.clone(),
            close_with_active_req: AtomicBool::new(false),
            total_stream: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            keep_alive: OnceLock::new(),
            connection_gauge: AtomicU8::new(GAUGE_UNCOUNTED),
            retired: OnceLock::new(),
            torn_down: AtomicBool::new(false),
        });

        let events = Arc::new(WeakListener::new(&ac));
        client.add_connection_event_listener(events.clone());
        client.set_stream_connection_event_listener(events);

        data.connection.connect().await?;

        if let Some(sub_protocol) = ctx.sub_protocol {
            let probe = KeepAliveProbe::new(
                Arc::downgrade(&client),
                sub_protocol,
                pool.keepalive,
                connection_id,
            );
            let listener = Arc::new(KeepAliveListener::new(probe.clone()));
            data.connection
                .add_connection_event_listener(listener.clone());
            let _ = ac.keep_alive.set(listener);
            probe.start();
            if ac.torn_down.load(Ordering::SeqCst) {
                probe.stop();
            }
        }

        if ac
            .connection_gauge
            .compare_exchange(
                GAUGE_UNCOUNTED,
                GAUGE_COUNTED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
        {
            pool.record(|s| {
                s.connection_total.inc(1);
                s.connection_active.inc(1);
            });
        }

        // Totals are shared by the whole cluster; buffered bytes are per connection.
        let cluster = pool.host.cluster_info();
        client.set_connection_stats(ConnectionStats {
            read_total: cluster.stats().bytes_read_total.clone(),
            read_buffered: Arc::new(Gauge::detached()),
            write_total: cluster.stats().bytes_write_total.clone(),
            write_buffered: Arc::new(Gauge::detached()),
        });

        Ok(ac)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.connection.id()
    }

    pub fn stream_client(&self) -> &Arc<dyn StreamClient> {
        &self.client
    }

    /// Streams ever opened on this client.
    pub fn total_streams(&self) -> u64 {
        self.total_stream.load(Ordering::Acquire)
    }

    /// Streams opened and not yet destroyed.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// True once a stream was reset because the connection went away.
    pub fn close_with_active_req(&self) -> bool {
        self.close_with_active_req.load(Ordering::Acquire)
    }

    pub fn keep_alive(&self) -> Option<&Arc<KeepAliveProbe>> {
        self.keep_alive.get().map(|l| l.probe())
    }

    pub(crate) fn set_close_with_active_req(&self) {
        self.close_with_active_req.store(true, Ordering::Release);
    }

    pub(crate) fn retired_cause(&self) -> Option<DeadCause> {
        self.retired.get().copied()
    }

    /// Record why this client left service. The first cause wins.
    pub(crate) fn mark_retired(&self, cause: DeadCause) {
        let _ = self.retired.set(cause);
    }

    pub(crate) fn close_connection(&self) {
        self.client.close();
    }

    /// Open a stream and register for its lifecycle events.
    pub(crate) fn open_stream(
        self: &Arc<Self>,
        ctx: &StreamContext,
        receiver: Arc<dyn StreamReceiveListener>,
    ) -> Arc<dyn StreamSender> {
        self.total_stream.fetch_add(1, Ordering::AcqRel);
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let sender = self.client.new_stream(ctx, receiver);
        sender.get_stream().add_event_listener(self.clone());
        sender
    }

    /// Release what this client holds in shared counters and stop its probe.
    pub(crate) fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(listener) = self.keep_alive.get() {
            listener.probe().stop();
        }
        if self.connection_gauge.swap(GAUGE_RELEASED, Ordering::SeqCst) == GAUGE_COUNTED {
            self.pool.record(|s| s.connection_active.dec(1));
        }
    }
}

impl ConnectionEventListener for ActiveClient {
    fn on_event(&self, event: ConnectionEvent) {
        self.pool.on_connection_event(self, event);
    }
}

impl StreamEventListener for ActiveClient {
    fn on_reset_stream(&self, reason: StreamResetReason) {
        self.pool.on_stream_reset(self, reason);
    }

    fn on_destroy_stream(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
        self.pool.on_stream_destroy(self);
    }
}

impl StreamConnectionEventListener for ActiveClient {
    fn on_go_away(&self) {
        tracing::debug!(
            host = %self.pool.host.address(),
            connection_id = %self.connection_id(),
            "Upstream sent go-away"
        );
    }
}

impl std::fmt::Debug for ActiveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveClient")
            .field("connection_id", &self.connection_id())
            .field("total_stream", &self.total_streams())
            .field("in_flight", &self.in_flight())
            .field("close_with_active_req", &self.close_with_active_req())
            .field("retired", &self.retired_cause())
            .finish()
    }
}

/// Forwards events to a target that may already be gone.
pub(crate) struct WeakListener<T> {
    target: Weak<T>,
}

impl<T> WeakListener<T> {
    pub(crate) fn new(target: &Arc<T>) -> Self {
        Self {
            target: Arc::downgrade(target),
        }
    }
}

impl<T: ConnectionEventListener> ConnectionEventListener for WeakListener<T> {
    fn on_event(&self, event: ConnectionEvent) {
        if let Some(target) = self.target.upgrade() {
            target.on_event(event);
        }
    }
}

impl<T: StreamConnectionEventListener> StreamConnectionEventListener for WeakListener<T> {
    fn on_go_away(&self) {
        if let Some(target) = self.target.upgrade() {
            target.on_go_away();
        }
    }
}
