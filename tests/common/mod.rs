//! Fake collaborators shared by the pool integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::Notify;

use mesh_connpool::net::{
    CloseType, Connection, ConnectionEvent, ConnectionEventListener, ConnectionId, TransportError,
};
use mesh_connpool::pool::{MultiplexPool, PoolOptions, PoolStateKind};
use mesh_connpool::stream::{
    ConnectionStats, PoolEventListener, PoolFailureReason, Protocol, Stream, StreamClient,
    StreamClientFactory, StreamConnectionEventListener, StreamContext, StreamEventListener,
    StreamReceiveListener, StreamResetReason, StreamSender, SubProtocol,
};
use mesh_connpool::upstream::{
    ClusterInfo, CreateConnectionData, Host, HostInfo, RequestBudget, Resource, ResourceManager,
    StaticCluster, UpstreamStats,
};

/// How a fake connection answers its handshake.
#[derive(Clone)]
pub enum ConnectBehavior {
    Succeed,
    Refuse,
    /// Wait for the gate to open, then succeed.
    Gated(Arc<Notify>),
}

pub struct FakeConnection {
    id: ConnectionId,
    behavior: ConnectBehavior,
    listeners: Mutex<Vec<Arc<dyn ConnectionEventListener>>>,
    closed: AtomicBool,
    pub close_calls: AtomicUsize,
}

impl FakeConnection {
    fn new(behavior: ConnectBehavior) -> Self {
        Self {
            id: ConnectionId::new(),
            behavior,
            listeners: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Deliver `event` to every listener, as the transport's I/O task would.
    pub fn emit(&self, event: ConnectionEvent) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_event(event);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl Connection for FakeConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn connect(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        let behavior = self.behavior.clone();
        Box::pin(async move {
            match behavior {
                ConnectBehavior::Succeed => Ok(()),
                ConnectBehavior::Refuse => Err(TransportError::Refused("fake refused".into())),
                ConnectBehavior::Gated(gate) => {
                    gate.notified().await;
                    Ok(())
                }
            }
        })
    }

    fn close(&self, _close_type: CloseType) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.emit(ConnectionEvent::LocalClose);
        }
    }

    fn add_connection_event_listener(&self, listener: Arc<dyn ConnectionEventListener>) {
        self.listeners.lock().unwrap().push(listener);
    }
}

pub struct FakeStream {
    id: u64,
    listeners: Mutex<Vec<Arc<dyn StreamEventListener>>>,
    destroyed: AtomicBool,
}

impl FakeStream {
    /// Finish the stream normally.
    pub fn finish(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let listeners = std::mem::take(&mut *self.listeners.lock().unwrap());
        for listener in listeners {
            listener.on_destroy_stream();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Stream for FakeStream {
    fn id(&self) -> u64 {
        self.id
    }

    fn add_event_listener(&self, listener: Arc<dyn StreamEventListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    fn reset_stream(&self, reason: StreamResetReason) {
        if self.is_destroyed() {
            return;
        }
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_reset_stream(reason);
        }
        self.finish();
    }
}

pub struct FakeSender {
    pub stream: Arc<FakeStream>,
}

impl StreamSender for FakeSender {
    fn get_stream(&self) -> &dyn Stream {
        &*self.stream
    }
}

pub struct FakeStreamClient {
    pub protocol: Protocol,
    pub codec_ctx: StreamContext,
    connection: Arc<dyn Connection>,
    pub streams: Mutex<Vec<Arc<FakeStream>>>,
    next_stream_id: AtomicU64,
    pub stats: Mutex<Option<ConnectionStats>>,
    pub go_away_listener: Mutex<Option<Arc<dyn StreamConnectionEventListener>>>,
    pub heartbeats: AtomicU64,
    /// When false, heartbeats are never answered.
    pub ack_heartbeats: AtomicBool,
}

impl FakeStreamClient {
    /// Reset every live stream with `reason`, as a codec does when its
    /// connection goes away.
    pub fn reset_all(&self, reason: StreamResetReason) {
        let streams = self.streams.lock().unwrap().clone();
        for stream in streams {
            stream.reset_stream(reason);
        }
    }

    pub fn stream(&self, index: usize) -> Arc<FakeStream> {
        self.streams.lock().unwrap()[index].clone()
    }
}

impl StreamClient for FakeStreamClient {
    fn new_stream(
        &self,
        _ctx: &StreamContext,
        _receiver: Arc<dyn StreamReceiveListener>,
    ) -> Arc<dyn StreamSender> {
        let stream = Arc::new(FakeStream {
            id: self.next_stream_id.fetch_add(1, Ordering::SeqCst),
            listeners: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        });
        self.streams.lock().unwrap().push(stream.clone());
        Arc::new(FakeSender { stream })
    }

    fn add_connection_event_listener(&self, listener: Arc<dyn ConnectionEventListener>) {
        self.connection.add_connection_event_listener(listener);
    }

    fn set_stream_connection_event_listener(
        &self,
        listener: Arc<dyn StreamConnectionEventListener>,
    ) {
        *self.go_away_listener.lock().unwrap() = Some(listener);
    }

    fn set_connection_stats(&self, stats: ConnectionStats) {
        *self.stats.lock().unwrap() = Some(stats);
    }

    fn close(&self) {
        self.connection.close(CloseType::NoFlush);
    }

    fn send_heartbeat(
        &self,
        _sub_protocol: SubProtocol,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
        if self.ack_heartbeats.load(Ordering::SeqCst) {
            Box::pin(async { Ok(()) })
        } else {
            Box::pin(futures_util::future::pending())
        }
    }
}

#[derive(Default)]
pub struct FakeCodecs {
    pub clients: Mutex<Vec<Arc<FakeStreamClient>>>,
}

impl FakeCodecs {
    pub fn client(&self, index: usize) -> Arc<FakeStreamClient> {
        self.clients.lock().unwrap()[index].clone()
    }

    pub fn created(&self) -> usize {
        self.clients.lock().unwrap().len()
    }
}

impl StreamClientFactory for FakeCodecs {
    fn create(
        &self,
        protocol: Protocol,
        ctx: &StreamContext,
        connection: Arc<dyn Connection>,
        _host_info: HostInfo,
    ) -> Arc<dyn StreamClient> {
        let client = Arc::new(FakeStreamClient {
            protocol,
            codec_ctx: ctx.clone(),
            connection,
            streams: Mutex::new(Vec::new()),
            next_stream_id: AtomicU64::new(1),
            stats: Mutex::new(None),
            go_away_listener: Mutex::new(None),
            heartbeats: AtomicU64::new(0),
            ack_heartbeats: AtomicBool::new(true),
        });
        self.clients.lock().unwrap().push(client.clone());
        client
    }
}

/// Budget whose admission can be switched off from a test.
pub struct SwitchableBudget {
    inner: RequestBudget,
    pub deny: AtomicBool,
}

impl SwitchableBudget {
    pub fn new(max: u64) -> Self {
        Self {
            inner: RequestBudget::new(max),
            deny: AtomicBool::new(false),
        }
    }
}

impl Resource for SwitchableBudget {
    fn can_create(&self) -> bool {
        !self.deny.load(Ordering::SeqCst) && self.inner.can_create()
    }

    fn increase(&self) {
        self.inner.increase()
    }

    fn decrease(&self) {
        self.inner.decrease()
    }

    fn max(&self) -> u64 {
        self.inner.max()
    }

    fn current(&self) -> u64 {
        self.inner.current()
    }
}

pub struct FakeHost {
    address: String,
    behavior: ConnectBehavior,
    stats: UpstreamStats,
    cluster: Arc<StaticCluster>,
    pub budget: Arc<SwitchableBudget>,
    pub connections: Mutex<Vec<Arc<FakeConnection>>>,
    pub last_ctx: Mutex<Option<StreamContext>>,
}

impl FakeHost {
    pub fn new(behavior: ConnectBehavior, max_requests: u64) -> Arc<Self> {
        let address = "127.0.0.1:12200".to_string();
        let budget = Arc::new(SwitchableBudget::new(max_requests));
        let cluster = Arc::new(StaticCluster::new(
            "rpc-cluster",
            ResourceManager::new(budget.clone()),
        ));
        Arc::new(Self {
            stats: UpstreamStats::for_host(address.clone()),
            address,
            behavior,
            cluster,
            budget,
            connections: Mutex::new(Vec::new()),
            last_ctx: Mutex::new(None),
        })
    }

    pub fn connection(&self, index: usize) -> Arc<FakeConnection> {
        self.connections.lock().unwrap()[index].clone()
    }

    pub fn cluster(&self) -> &StaticCluster {
        &self.cluster
    }
}

impl Host for FakeHost {
    fn address(&self) -> &str {
        &self.address
    }

    fn create_connection(&self, ctx: &StreamContext) -> CreateConnectionData {
        *self.last_ctx.lock().unwrap() = Some(ctx.clone());
        let connection = Arc::new(FakeConnection::new(self.behavior.clone()));
        self.connections.lock().unwrap().push(connection.clone());
        CreateConnectionData {
            connection,
            host_info: self.host_info(),
        }
    }

    fn host_stats(&self) -> &UpstreamStats {
        &self.stats
    }

    fn cluster_info(&self) -> Arc<dyn ClusterInfo> {
        self.cluster.clone()
    }
}

pub struct NullReceiver;

impl StreamReceiveListener for NullReceiver {
    fn on_receive(&self, _frame: &[u8], _end_stream: bool) {}
    fn on_decode_error(&self, _err: &TransportError) {}
}

pub fn receiver() -> Arc<dyn StreamReceiveListener> {
    Arc::new(NullReceiver)
}

pub enum Outcome {
    Ready {
        sender: Arc<dyn StreamSender>,
        host: Arc<dyn Host>,
    },
    Failure {
        reason: PoolFailureReason,
        with_host: bool,
    },
}

#[derive(Default)]
pub struct RecordingListener {
    pub outcomes: Mutex<Vec<Outcome>>,
}

impl RecordingListener {
    pub fn failures(&self) -> Vec<PoolFailureReason> {
        self.outcomes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|o| match o {
                Outcome::Failure { reason, .. } => Some(*reason),
                Outcome::Ready { .. } => None,
            })
            .collect()
    }

    pub fn ready_count(&self) -> usize {
        self.outcomes
            .lock()
            .unwrap()
            .iter()
            .filter(|o| matches!(o, Outcome::Ready { .. }))
            .count()
    }
}

impl PoolEventListener for RecordingListener {
    fn on_ready(&self, sender: Arc<dyn StreamSender>, host: Arc<dyn Host>) {
        self.outcomes.lock().unwrap().push(Outcome::Ready { sender, host });
    }

    fn on_failure(&self, reason: PoolFailureReason, host: Option<Arc<dyn Host>>) {
        self.outcomes.lock().unwrap().push(Outcome::Failure {
            reason,
            with_host: host.is_some(),
        });
    }
}

/// A pool wired to fake collaborators.
pub struct Fixture {
    pub host: Arc<FakeHost>,
    pub codecs: Arc<FakeCodecs>,
    pub pool: MultiplexPool,
}

impl Fixture {
    pub fn new(behavior: ConnectBehavior, max_requests: u64) -> Self {
        Self::with_options(behavior, max_requests, PoolOptions::new(Protocol::SofaRpc))
    }

    pub fn with_options(behavior: ConnectBehavior, max_requests: u64, options: PoolOptions) -> Self {
        let host = FakeHost::new(behavior, max_requests);
        let codecs = Arc::new(FakeCodecs::default());
        let pool = MultiplexPool::new(host.clone(), codecs.clone(), options);
        Self { host, codecs, pool }
    }

    /// Build a pool and wait for its bootstrap connect to settle.
    pub async fn settled(behavior: ConnectBehavior, max_requests: u64) -> Self {
        let fixture = Self::new(behavior, max_requests);
        fixture.wait_settled().await;
        fixture
    }

    pub async fn wait_settled(&self) {
        wait_until(|| self.pool.state_kind() != PoolStateKind::Connecting).await;
    }

    pub fn host_stats(&self) -> mesh_connpool::upstream::StatsSnapshot {
        self.host.host_stats().snapshot()
    }

    pub fn cluster_stats(&self) -> mesh_connpool::upstream::StatsSnapshot {
        self.host.cluster().stats().snapshot()
    }
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}
