//! Admission budget for upstream requests.
//!
//! # Responsibilities
//! - Answer whether one more request may be created against a cluster
//! - Track in-use units as requests start and finish
//!
//! # Design Decisions
//! - The pool only sees the `Resource` contract; accounting lives behind it
//! - Budgets are shared by every pool in a cluster, so all operations are atomic

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A thread-safe counter with a capacity ceiling.
pub trait Resource: Send + Sync {
    /// True if one more unit fits under the ceiling.
    fn can_create(&self) -> bool;
    /// Consume one unit.
    fn increase(&self);
    /// Release one unit.
    fn decrease(&self);
    /// Capacity ceiling.
    fn max(&self) -> u64;
    /// Units currently in use.
    fn current(&self) -> u64;
}

/// Counting budget backed by a single atomic.
#[derive(Debug)]
pub struct RequestBudget {
    max: u64,
    current: AtomicU64,
}

impl RequestBudget {
    pub fn new(max: u64) -> Self {
        Self {
            max,
            current: AtomicU64::new(0),
        }
    }
}

impl Resource for RequestBudget {
    fn can_create(&self) -> bool {
        self.current.load(Ordering::Acquire) < self.max
    }

    fn increase(&self) {
        self.current.fetch_add(1, Ordering::AcqRel);
    }

    fn decrease(&self) {
        // Never wrap below zero on an unbalanced release.
        let _ = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
    }

    fn max(&self) -> u64 {
        self.max
    }

    fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }
}

/// Per-cluster resource limits consumed by the pool.
#[derive(Clone)]
pub struct ResourceManager {
    requests: Arc<dyn Resource>,
}

impl ResourceManager {
    pub fn new(requests: Arc<dyn Resource>) -> Self {
        Self { requests }
    }

    /// Manager with a plain counting budget of `max_requests`.
    pub fn with_max_requests(max_requests: u64) -> Self {
        Self::new(Arc::new(RequestBudget::new(max_requests)))
    }

    /// Budget gating new request streams.
    pub fn requests(&self) -> &Arc<dyn Resource> {
        &self.requests
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("requests_max", &self.requests.max())
            .field("requests_current", &self.requests.current())
            .finish()
    }
}
