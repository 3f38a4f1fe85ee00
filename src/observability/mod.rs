//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pool and client events produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters and gauges via the metrics facade)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (host, protocol, connection_id) on every pool event
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
