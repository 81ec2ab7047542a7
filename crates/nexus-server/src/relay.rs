//! The relay core shared by every connection task.

use std::sync::Arc;

use tracing::info;

use nexus_store::{DeliveryLog, DurableStore, GroupStore, IdentityStore, StoreError};

use crate::registry::ConnectionRegistry;

/// Durable stores plus the live connection registry.
///
/// One instance lives for the whole process and is shared by `Arc`. Each
/// member has its own lock, so unrelated operations never serialize on a
/// single global lock.
pub struct Relay {
    pub identities: IdentityStore,
    pub groups: GroupStore,
    pub deliveries: DeliveryLog,
    pub registry: ConnectionRegistry,
}

impl Relay {
    /// Load all collections from `backend` and start with nobody online.
    pub fn open(backend: Arc<dyn DurableStore>) -> Result<Self, StoreError> {
        let relay = Self {
            identities: IdentityStore::load(backend.clone())?,
            groups: GroupStore::load(backend.clone())?,
            deliveries: DeliveryLog::load(backend)?,
            registry: ConnectionRegistry::new(),
        };
        info!("Relay state loaded");
        Ok(relay)
    }
}
