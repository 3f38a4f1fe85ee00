//! Single-connection multiplexed pool.
//!
//! # Responsibilities
//! - Own zero or one `ActiveClient` for a host
//! - Gate new streams through the cluster's admission budget
//! - Reduce connection and stream events into counters and state transitions
//!
//! # State Transitions
//! ```text
//! Connecting → Active:  construction connected and published its client
//! Connecting → Dead:    handshake failed, or the pool was closed
//! Active → Dead:        LocalClose, RemoteClose, ConnectTimeout, ConnectFailed, close()
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::KeepAliveConfig;
use crate::net::ConnectionEvent;
use crate::stream::{
    PoolEventListener, PoolFailureReason, Protocol, StreamClientFactory, StreamContext,
    StreamReceiveListener, StreamResetReason,
};
use crate::upstream::{Host, UpstreamStats};

use super::active_client::ActiveClient;
use super::registry::PoolFactory;
use super::ConnectionPool;

/// Why a pool stopped serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadCause {
    /// The bootstrap handshake failed.
    HandshakeFailed,
    LocalClose,
    RemoteClose,
    ConnectTimeout,
    ConnectFailed,
    /// Closed or dropped by its owner.
    Closed,
}

impl DeadCause {
    fn from_event(event: ConnectionEvent) -> Option<Self> {
        match event {
            ConnectionEvent::LocalClose => Some(DeadCause::LocalClose),
            ConnectionEvent::RemoteClose => Some(DeadCause::RemoteClose),
            ConnectionEvent::ConnectTimeout => Some(DeadCause::ConnectTimeout),
            ConnectionEvent::ConnectFailed => Some(DeadCause::ConnectFailed),
            _ => None,
        }
    }
}

/// Pool state. Guarded by the pool mutex.
pub(crate) enum PoolState {
    Connecting,
    Active(Arc<ActiveClient>),
    Dead(DeadCause),
}

/// Observable summary of [`PoolState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStateKind {
    Connecting,
    Active,
    Dead,
}

/// Construction options shared by every pool a factory builds.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub protocol: Protocol,
    pub keepalive: KeepAliveConfig,
    /// Context for the bootstrap connection. A sub-protocol here enables
    /// keep-alive probing.
    pub bootstrap: StreamContext,
}

impl PoolOptions {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            keepalive: KeepAliveConfig::default(),
            bootstrap: StreamContext::default(),
        }
    }
}

/// State and reducers shared between the pool handle and its client.
pub(crate) struct PoolCore {
    pub(crate) protocol: Protocol,
    pub(crate) host: Arc<dyn Host>,
    pub(crate) codecs: Arc<dyn StreamClientFactory>,
    pub(crate) keepalive: KeepAliveConfig,
    state: Mutex<PoolState>,
}

impl PoolCore {
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to the host stats and to the cluster stats.
    pub(crate) fn record(&self, f: impl Fn(&UpstreamStats)) {
        f(self.host.host_stats());
        let cluster = self.host.cluster_info();
        let cluster_stats: &UpstreamStats = cluster.stats();
        f(cluster_stats);
    }

    fn current(&self) -> Option<Arc<ActiveClient>> {
        match &*self.lock_state() {
            PoolState::Active(client) => Some(client.clone()),
            _ => None,
        }
    }

    fn state_kind(&self) -> PoolStateKind {
        match &*self.lock_state() {
            PoolState::Connecting => PoolStateKind::Connecting,
            PoolState::Active(_) => PoolStateKind::Active,
            PoolState::Dead(_) => PoolStateKind::Dead,
        }
    }

    fn dead_cause(&self) -> Option<DeadCause> {
        match &*self.lock_state() {
            PoolState::Dead(cause) => Some(*cause),
            _ => None,
        }
    }

    /// Background construction of the pool's only client.
    async fn establish(self: Arc<Self>, ctx: StreamContext) {
        match ActiveClient::establish(self.clone(), &ctx).await {
            Ok(client) => self.install(client),
            Err(err) => {
                tracing::warn!(
                    host = %self.host.address(),
                    protocol = %self.protocol,
                    error = %err,
                    "Upstream connect failed, pool is dead"
                );
                let mut state = self.lock_state();
                if matches!(*state, PoolState::Connecting) {
                    *state = PoolState::Dead(DeadCause::HandshakeFailed);
                }
            }
        }
    }

    /// Publish a connected client, unless it already failed or the pool was
    /// closed while it was connecting.
    fn install(&self, client: Arc<ActiveClient>) {
        let mut state = self.lock_state();
        if let Some(cause) = client.retired_cause() {
            if matches!(*state, PoolState::Connecting) {
                *state = PoolState::Dead(cause);
            }
            drop(state);
            client.teardown();
            return;
        }
        if !matches!(*state, PoolState::Connecting) {
            client.mark_retired(DeadCause::Closed);
            drop(state);
            tracing::debug!(
                host = %self.host.address(),
                connection_id = %client.connection_id(),
                "Pool closed during connect, discarding connection"
            );
            client.close_connection();
            client.teardown();
            return;
        }
        *state = PoolState::Active(client.clone());
        drop(state);

        tracing::info!(
            host = %self.host.address(),
            protocol = %self.protocol,
            connection_id = %client.connection_id(),
            keepalive = client.keep_alive().is_some(),
            "Upstream connection active"
        );
    }

    /// Move `client` out of service. Transitions the pool only if `client`
    /// is the one currently installed.
    fn retire(&self, client: &ActiveClient, cause: DeadCause) -> bool {
        let was_current = {
            let mut state = self.lock_state();
            client.mark_retired(cause);
            let is_current = match &*state {
                PoolState::Active(current) => std::ptr::eq(Arc::as_ptr(current), client),
                _ => false,
            };
            if is_current {
                *state = PoolState::Dead(cause);
            }
            is_current
        };
        client.teardown();
        was_current
    }

    fn new_stream(
        &self,
        ctx: &StreamContext,
        receiver: Arc<dyn StreamReceiveListener>,
        listener: &dyn PoolEventListener,
    ) {
        let Some(client) = self.current() else {
            listener.on_failure(PoolFailureReason::ConnectionFailure, None);
            return;
        };

        let cluster = self.host.cluster_info();
        let requests = cluster.resource_manager().requests();
        if !requests.can_create() {
            listener.on_failure(PoolFailureReason::Overflow, None);
            self.record(|s| s.request_pending_overflow.inc(1));
            tracing::debug!(
                host = %self.host.address(),
                cluster = %cluster.name(),
                in_use = requests.current(),
                max = requests.max(),
                "Request admission denied"
            );
            return;
        }

        self.record(|s| {
            s.request_total.inc(1);
            s.request_active.inc(1);
        });
        requests.increase();
        let sender = client.open_stream(ctx, receiver);
        listener.on_ready(sender, self.host.clone());
    }

    fn close(&self) {
        let client = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, PoolState::Dead(DeadCause::Closed)) {
                PoolState::Active(client) => {
                    client.mark_retired(DeadCause::Closed);
                    Some(client)
                }
                PoolState::Connecting => None,
                PoolState::Dead(cause) => {
                    *state = PoolState::Dead(cause);
                    None
                }
            }
        };
        if let Some(client) = client {
            tracing::debug!(
                host = %self.host.address(),
                connection_id = %client.connection_id(),
                "Closing pool connection"
            );
            client.close_connection();
            client.teardown();
        }
    }

    pub(crate) fn on_connection_event(&self, client: &ActiveClient, event: ConnectionEvent) {
        let Some(cause) = DeadCause::from_event(event) else {
            return;
        };

        match event {
            ConnectionEvent::LocalClose if client.close_with_active_req() => {
                self.record(|s| s.connection_local_close_with_active_request.inc(1));
            }
            ConnectionEvent::RemoteClose if client.close_with_active_req() => {
                self.record(|s| s.connection_remote_close_with_active_request.inc(1));
            }
            ConnectionEvent::ConnectTimeout => self.record(|s| s.request_timeout.inc(1)),
            ConnectionEvent::ConnectFailed => self.record(|s| s.connection_con_fail.inc(1)),
            _ => {}
        }

        let was_current = self.retire(client, cause);
        if event == ConnectionEvent::ConnectTimeout {
            client.close_connection();
        }

        if was_current {
            tracing::info!(
                host = %self.host.address(),
                connection_id = %client.connection_id(),
                event = %event,
                with_active_requests = client.close_with_active_req(),
                "Upstream connection lost, pool is dead"
            );
        }
    }

    pub(crate) fn on_stream_destroy(&self, _client: &ActiveClient) {
        self.record(|s| s.request_active.dec(1));
        self.host
            .cluster_info()
            .resource_manager()
            .requests()
            .decrease();
    }

    pub(crate) fn on_stream_reset(&self, client: &ActiveClient, reason: StreamResetReason) {
        match reason {
            StreamResetReason::ConnectionTermination | StreamResetReason::ConnectionFailed => {
                self.record(|s| s.request_failure_eject.inc(1));
                client.set_close_with_active_req();
            }
            StreamResetReason::LocalReset => self.record(|s| s.request_local_reset.inc(1)),
            StreamResetReason::RemoteReset => self.record(|s| s.request_remote_reset.inc(1)),
            StreamResetReason::Overflow => {}
        }
        tracing::debug!(
            host = %self.host.address(),
            connection_id = %client.connection_id(),
            reason = ?reason,
            "Upstream stream reset"
        );
    }
}

/// Pool holding one multiplexed connection to a host.
///
/// Construction is fire-and-forget: the connection is established on a
/// background task and callers arriving earlier fail with
/// `ConnectionFailure`. Dropping the pool closes its connection.
pub struct MultiplexPool {
    core: Arc<PoolCore>,
}

impl MultiplexPool {
    /// Create the pool and start connecting. Must be called within a Tokio runtime.
    pub fn new(
        host: Arc<dyn Host>,
        codecs: Arc<dyn StreamClientFactory>,
        options: PoolOptions,
    ) -> Self {
        let core = Arc::new(PoolCore {
            protocol: options.protocol,
            host,
            codecs,
            keepalive: options.keepalive,
            state: Mutex::new(PoolState::Connecting),
        });

        tracing::debug!(
            host = %core.host.address(),
            protocol = %core.protocol,
            "Creating upstream pool"
        );
        tokio::spawn(core.clone().establish(options.bootstrap));

        Self { core }
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.core.host
    }

    pub fn state_kind(&self) -> PoolStateKind {
        self.core.state_kind()
    }

    /// Why the pool died, if it has.
    pub fn dead_cause(&self) -> Option<DeadCause> {
        self.core.dead_cause()
    }

    /// The installed client, if any.
    pub fn active_client(&self) -> Option<Arc<ActiveClient>> {
        self.core.current()
    }
}

impl ConnectionPool for MultiplexPool {
    fn protocol(&self) -> Protocol {
        self.core.protocol
    }

    fn active(&self) -> bool {
        matches!(*self.core.lock_state(), PoolState::Active(_))
    }

    fn new_stream(
        &self,
        ctx: &StreamContext,
        receiver: Arc<dyn StreamReceiveListener>,
        listener: &dyn PoolEventListener,
    ) {
        self.core.new_stream(ctx, receiver, listener)
    }

    fn close(&self) {
        self.core.close()
    }
}

impl Drop for MultiplexPool {
    fn drop(&mut self) {
        self.core.close();
    }
}

impl std::fmt::Debug for MultiplexPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplexPool")
            .field("host", &self.core.host.address())
            .field("protocol", &self.core.protocol)
            .field("state", &self.core.state_kind())
            .finish()
    }
}

/// Builds [`MultiplexPool`]s for a protocol.
pub struct MultiplexPoolFactory {
    codecs: Arc<dyn StreamClientFactory>,
    options: PoolOptions,
}

impl MultiplexPoolFactory {
    pub fn new(codecs: Arc<dyn StreamClientFactory>, options: PoolOptions) -> Self {
        Self { codecs, options }
    }
}

impl PoolFactory for MultiplexPoolFactory {
    fn new_pool(&self, host: Arc<dyn Host>) -> Arc<dyn ConnectionPool> {
        Arc::new(MultiplexPool::new(
            host,
            self.codecs.clone(),
            self.options.clone(),
        ))
    }
}
