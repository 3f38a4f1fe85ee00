//! Per-host and per-cluster upstream statistics.
//!
//! Every counter keeps its own atomic value (read back by diagnostics and
//! tests) and mirrors updates into the `metrics` facade, labelled with the
//! host address or cluster name. Without an installed recorder the mirror is
//! a no-op.

use std::ops::Deref;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Metric names, shared by host and cluster scopes.
pub mod names {
    pub const CONNECTION_TOTAL: &str = "upstream_connection_total";
    pub const CONNECTION_ACTIVE: &str = "upstream_connection_active";
    pub const CONNECTION_CON_FAIL: &str = "upstream_connection_con_fail";
    pub const CONNECTION_LOCAL_CLOSE_WITH_ACTIVE_REQUEST: &str =
        "upstream_connection_local_close_with_active_request";
    pub const CONNECTION_REMOTE_CLOSE_WITH_ACTIVE_REQUEST: &str =
        "upstream_connection_remote_close_with_active_request";
    pub const REQUEST_TOTAL: &str = "upstream_request_total";
    pub const REQUEST_ACTIVE: &str = "upstream_request_active";
    pub const REQUEST_PENDING_OVERFLOW: &str = "upstream_request_pending_overflow";
    pub const REQUEST_TIMEOUT: &str = "upstream_request_timeout";
    pub const REQUEST_LOCAL_RESET: &str = "upstream_request_local_reset";
    pub const REQUEST_REMOTE_RESET: &str = "upstream_request_remote_reset";
    pub const REQUEST_FAILURE_EJECT: &str = "upstream_request_failure_eject";
    pub const BYTES_READ_TOTAL: &str = "upstream_bytes_read_total";
    pub const BYTES_WRITE_TOTAL: &str = "upstream_bytes_write_total";
}

/// Which label a stats block reports under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsScope {
    Host(String),
    Cluster(String),
}

/// A monotonically increasing counter.
#[derive(Debug)]
pub struct Counter {
    value: AtomicU64,
    sink: metrics::Counter,
}

impl Counter {
    /// Create a counter mirrored into the metrics facade.
    pub fn new(name: &'static str, scope: &StatsScope) -> Self {
        let sink = match scope {
            StatsScope::Host(addr) => metrics::counter!(name, "host" => addr.clone()),
            StatsScope::Cluster(cluster) => metrics::counter!(name, "cluster" => cluster.clone()),
        };
        Self {
            value: AtomicU64::new(0),
            sink,
        }
    }

    /// Create a counter that is not exported.
    pub fn detached() -> Self {
        Self {
            value: AtomicU64::new(0),
            sink: metrics::Counter::noop(),
        }
    }

    pub fn inc(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
        self.sink.increment(n);
    }

    pub fn count(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A value that moves both ways (active connections, buffered bytes).
#[derive(Debug)]
pub struct Gauge {
    value: AtomicI64,
    sink: metrics::Gauge,
}

impl Gauge {
    /// Create a gauge mirrored into the metrics facade.
    pub fn new(name: &'static str, scope: &StatsScope) -> Self {
        let sink = match scope {
            StatsScope::Host(addr) => metrics::gauge!(name, "host" => addr.clone()),
            StatsScope::Cluster(cluster) => metrics::gauge!(name, "cluster" => cluster.clone()),
        };
        Self {
            value: AtomicI64::new(0),
            sink,
        }
    }

    /// Create a gauge that is not exported.
    pub fn detached() -> Self {
        Self {
            value: AtomicI64::new(0),
            sink: metrics::Gauge::noop(),
        }
    }

    pub fn inc(&self, n: i64) {
        self.value.fetch_add(n, Ordering::Relaxed);
        self.sink.increment(n as f64);
    }

    pub fn dec(&self, n: i64) {
        self.value.fetch_sub(n, Ordering::Relaxed);
        self.sink.decrement(n as f64);
    }

    pub fn update(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
        self.sink.set(v as f64);
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// The counter set the pool maintains for one host, mirrored at cluster level.
#[derive(Debug)]
pub struct UpstreamStats {
    pub scope: StatsScope,
    pub connection_total: Counter,
    pub connection_active: Gauge,
    pub connection_con_fail: Counter,
    pub connection_local_close_with_active_request: Counter,
    pub connection_remote_close_with_active_request: Counter,
    pub request_total: Counter,
    pub request_active: Gauge,
    pub request_pending_overflow: Counter,
    pub request_timeout: Counter,
    pub request_local_reset: Counter,
    pub request_remote_reset: Counter,
    pub request_failure_eject: Counter,
}

impl UpstreamStats {
    pub fn new(scope: StatsScope) -> Self {
        Self {
            connection_total: Counter::new(names::CONNECTION_TOTAL, &scope),
            connection_active: Gauge::new(names::CONNECTION_ACTIVE, &scope),
            connection_con_fail: Counter::new(names::CONNECTION_CON_FAIL, &scope),
            connection_local_close_with_active_request: Counter::new(
                names::CONNECTION_LOCAL_CLOSE_WITH_ACTIVE_REQUEST,
                &scope,
            ),
            connection_remote_close_with_active_request: Counter::new(
                names::CONNECTION_REMOTE_CLOSE_WITH_ACTIVE_REQUEST,
                &scope,
            ),
            request_total: Counter::new(names::REQUEST_TOTAL, &scope),
            request_active: Gauge::new(names::REQUEST_ACTIVE, &scope),
            request_pending_overflow: Counter::new(names::REQUEST_PENDING_OVERFLOW, &scope),
            request_timeout: Counter::new(names::REQUEST_TIMEOUT, &scope),
            request_local_reset: Counter::new(names::REQUEST_LOCAL_RESET, &scope),
            request_remote_reset: Counter::new(names::REQUEST_REMOTE_RESET, &scope),
            request_failure_eject: Counter::new(names::REQUEST_FAILURE_EJECT, &scope),
            scope,
        }
    }

    /// Stats block for a single host.
    pub fn for_host(addr: impl Into<String>) -> Self {
        Self::new(StatsScope::Host(addr.into()))
    }

    /// Point-in-time copy of every value.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connection_total: self.connection_total.count(),
            connection_active: self.connection_active.value(),
            connection_con_fail: self.connection_con_fail.count(),
            connection_local_close_with_active_request: self
                .connection_local_close_with_active_request
                .count(),
            connection_remote_close_with_active_request: self
                .connection_remote_close_with_active_request
                .count(),
            request_total: self.request_total.count(),
            request_active: self.request_active.value(),
            request_pending_overflow: self.request_pending_overflow.count(),
            request_timeout: self.request_timeout.count(),
            request_local_reset: self.request_local_reset.count(),
            request_remote_reset: self.request_remote_reset.count(),
            request_failure_eject: self.request_failure_eject.count(),
        }
    }
}

/// Plain values read from an [`UpstreamStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connection_total: u64,
    pub connection_active: i64,
    pub connection_con_fail: u64,
    pub connection_local_close_with_active_request: u64,
    pub connection_remote_close_with_active_request: u64,
    pub request_total: u64,
    pub request_active: i64,
    pub request_pending_overflow: u64,
    pub request_timeout: u64,
    pub request_local_reset: u64,
    pub request_remote_reset: u64,
    pub request_failure_eject: u64,
}

/// Cluster-wide stats: the host counter set plus byte totals shared by
/// every connection in the cluster.
#[derive(Debug)]
pub struct ClusterStats {
    upstream: UpstreamStats,
    pub bytes_read_total: Arc<Counter>,
    pub bytes_write_total: Arc<Counter>,
}

impl ClusterStats {
    pub fn new(cluster: impl Into<String>) -> Self {
        let scope = StatsScope::Cluster(cluster.into());
        Self {
            bytes_read_total: Arc::new(Counter::new(names::BYTES_READ_TOTAL, &scope)),
            bytes_write_total: Arc::new(Counter::new(names::BYTES_WRITE_TOTAL, &scope)),
            upstream: UpstreamStats::new(scope),
        }
    }
}

impl Deref for ClusterStats {
    type Target = UpstreamStats;
    fn deref(&self) -> &Self::Target {
        &self.upstream
    }
}
