//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (interval > 0, retries > 0, budgets > 0)
//! - Detect duplicate cluster names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PoolSettings → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::PoolSettings;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("keepalive.interval_ms must be greater than zero")]
    ZeroKeepAliveInterval,

    #[error("keepalive.max_retries must be greater than zero")]
    ZeroKeepAliveRetries,

    #[error("invalid metrics address: {0}")]
    InvalidMetricsAddress(String),

    #[error("cluster name must not be empty")]
    EmptyClusterName,

    #[error("duplicate cluster name: {0}")]
    DuplicateCluster(String),

    #[error("cluster {0}: max_requests must be greater than zero")]
    ZeroMaxRequests(String),
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &PoolSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.keepalive.interval_ms == 0 {
        errors.push(ValidationError::ZeroKeepAliveInterval);
    }
    if config.keepalive.max_retries == 0 {
        errors.push(ValidationError::ZeroKeepAliveRetries);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for cluster in &config.clusters {
        if cluster.name.is_empty() {
            errors.push(ValidationError::EmptyClusterName);
        } else if !seen.insert(cluster.name.as_str()) {
            errors.push(ValidationError::DuplicateCluster(cluster.name.clone()));
        }
        if cluster.max_requests == 0 {
            errors.push(ValidationError::ZeroMaxRequests(cluster.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
