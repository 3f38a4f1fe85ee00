//! Protocol → pool factory registry.
//!
//! Built and populated during startup, then shared by reference with
//! whatever creates pools for hosts.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::stream::Protocol;
use crate::upstream::Host;

use super::ConnectionPool;

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no pool factory registered for protocol {0}")]
    UnknownProtocol(Protocol),

    #[error("pool factory already registered for protocol {0}")]
    DuplicateProtocol(Protocol),
}

/// Creates a pool for a host.
pub trait PoolFactory: Send + Sync {
    fn new_pool(&self, host: Arc<dyn Host>) -> Arc<dyn ConnectionPool>;
}

impl<F> PoolFactory for F
where
    F: Fn(Arc<dyn Host>) -> Arc<dyn ConnectionPool> + Send + Sync,
{
    fn new_pool(&self, host: Arc<dyn Host>) -> Arc<dyn ConnectionPool> {
        self(host)
    }
}

/// Maps protocols to the factories that build their pools.
#[derive(Default)]
pub struct PoolFactoryRegistry {
    factories: HashMap<Protocol, Arc<dyn PoolFactory>>,
}

impl PoolFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `protocol`. Each protocol may be registered once.
    pub fn register(
        &mut self,
        protocol: Protocol,
        factory: Arc<dyn PoolFactory>,
    ) -> Result<(), RegistryError> {
        if self.factories.contains_key(&protocol) {
            return Err(RegistryError::DuplicateProtocol(protocol));
        }
        tracing::debug!(protocol = %protocol, "Pool factory registered");
        self.factories.insert(protocol, factory);
        Ok(())
    }

    pub fn is_registered(&self, protocol: Protocol) -> bool {
        self.factories.contains_key(&protocol)
    }

    pub fn protocols(&self) -> impl Iterator<Item = Protocol> + '_ {
        self.factories.keys().copied()
    }

    /// Build a pool for `host` speaking `protocol`.
    pub fn new_pool(
        &self,
        protocol: Protocol,
        host: Arc<dyn Host>,
    ) -> Result<Arc<dyn ConnectionPool>, RegistryError> {
        let factory = self
            .factories
            .get(&protocol)
            .ok_or(RegistryError::UnknownProtocol(protocol))?;
        Ok(factory.new_pool(host))
    }
}

impl std::fmt::Debug for PoolFactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolFactoryRegistry")
            .field("protocols", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
