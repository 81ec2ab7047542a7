//! The key-value contract the stores persist through.
//!
//! A backend only has to load a whole collection and atomically replace a
//! whole collection. Collections are JSON documents keyed by name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// Username -> credential hash.
pub const USERS: &str = "users";
/// Group name -> member list.
pub const GROUPS: &str = "groups";
/// Sender -> ordered delivery records.
pub const MESSAGES: &str = "messages";

pub trait DurableStore: Send + Sync {
    /// Return the stored document for `collection`, if any.
    fn load(&self, collection: &str) -> Result<Option<String>>;

    /// Replace the stored document for `collection`. Must be atomic: after a
    /// failure the previous document is still the stored one.
    fn save(&self, collection: &str, body: &str) -> Result<()>;
}

/// Load and decode a collection, or its default when nothing is stored yet.
pub fn load_collection<T>(store: &dyn DurableStore, collection: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match store.load(collection)? {
        Some(body) => Ok(serde_json::from_str(&body)?),
        None => Ok(T::default()),
    }
}

/// Encode `value` on the caller's thread, then hand the write to the
/// blocking pool. Backends may fsync, which must not stall async workers.
pub async fn save_collection<T>(
    store: &Arc<dyn DurableStore>,
    collection: &'static str,
    value: &T,
) -> Result<()>
where
    T: Serialize,
{
    let body = serde_json::to_string(value)?;
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || store.save(collection, &body)).await?
}

/// Volatile backend for tests and throwaway instances.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn load(&self, collection: &str) -> Result<Option<String>> {
        let collections = self
            .collections
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(collections.get(collection).cloned())
    }

    fn save(&self, collection: &str, body: &str) -> Result<()> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        collections.insert(collection.to_string(), body.to_string());
        Ok(())
    }
}
