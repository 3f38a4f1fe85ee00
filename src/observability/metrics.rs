//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Install the Prometheus recorder behind the `metrics` facade
//! - Describe the upstream pool counters
//!
//! # Metrics
//! - `upstream_connection_*` (counter/gauge): connection lifecycle by host/cluster
//! - `upstream_request_*` (counter/gauge): request admission and outcomes
//! - `upstream_bytes_*_total` (counter): bytes moved per cluster
//!
//! # Design Decisions
//! - Counters update through `UpstreamStats`, which mirrors into the facade
//! - Without an installed recorder every update is a no-op

use std::net::SocketAddr;

use metrics::{describe_counter, describe_gauge, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::upstream::stats::names;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_pool_metrics();
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Register descriptions for every pool metric.
pub fn describe_pool_metrics() {
    describe_counter!(names::CONNECTION_TOTAL, "Upstream connections established");
    describe_gauge!(names::CONNECTION_ACTIVE, "Upstream connections currently open");
    describe_counter!(names::CONNECTION_CON_FAIL, "Upstream connect failures");
    describe_counter!(
        names::CONNECTION_LOCAL_CLOSE_WITH_ACTIVE_REQUEST,
        "Connections closed locally while requests were outstanding"
    );
    describe_counter!(
        names::CONNECTION_REMOTE_CLOSE_WITH_ACTIVE_REQUEST,
        "Connections closed by the peer while requests were outstanding"
    );
    describe_counter!(names::REQUEST_TOTAL, "Upstream requests started");
    describe_gauge!(names::REQUEST_ACTIVE, "Upstream requests in flight");
    describe_counter!(
        names::REQUEST_PENDING_OVERFLOW,
        "Requests rejected by the admission budget"
    );
    describe_counter!(names::REQUEST_TIMEOUT, "Upstream connect timeouts");
    describe_counter!(names::REQUEST_LOCAL_RESET, "Requests reset locally");
    describe_counter!(names::REQUEST_REMOTE_RESET, "Requests reset by the peer");
    describe_counter!(
        names::REQUEST_FAILURE_EJECT,
        "Requests reset because their connection failed"
    );
    describe_counter!(names::BYTES_READ_TOTAL, Unit::Bytes, "Bytes read from upstreams");
    describe_counter!(names::BYTES_WRITE_TOTAL, Unit::Bytes, "Bytes written to upstreams");
}
