//! Named groups with a member set fixed at creation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::backend::{load_collection, save_collection, DurableStore, GROUPS};
use crate::error::{GroupError, Result as StoreResult};

pub struct GroupStore {
    backend: Arc<dyn DurableStore>,
    groups: RwLock<BTreeMap<String, BTreeSet<String>>>,
}

impl GroupStore {
    /// Load the groups collection from `backend`.
    pub fn load(backend: Arc<dyn DurableStore>) -> StoreResult<Self> {
        let groups: BTreeMap<String, BTreeSet<String>> =
            load_collection(backend.as_ref(), GROUPS)?;
        info!(count = groups.len(), "Group store loaded");
        Ok(Self {
            backend,
            groups: RwLock::new(groups),
        })
    }

    /// Create `name` with the deduplicated `members`. Returns the stored set.
    pub async fn create<I>(&self, name: &str, members: I) -> Result<BTreeSet<String>, GroupError>
    where
        I: IntoIterator<Item = String>,
    {
        if name.trim().is_empty() {
            return Err(GroupError::InvalidInput);
        }

        let members: BTreeSet<String> = members.into_iter().collect();

        let mut groups = self.groups.write().await;
        if groups.contains_key(name) {
            return Err(GroupError::AlreadyExists);
        }

        groups.insert(name.to_string(), members.clone());
        let saved = save_collection(&self.backend, GROUPS, &*groups).await;
        if let Err(e) = saved {
            groups.remove(name);
            return Err(e.into());
        }

        info!(group = %name, members = members.len(), "Group created");
        Ok(members)
    }

    /// Members of `name`; empty when the group does not exist.
    pub async fn members_of(&self, name: &str) -> BTreeSet<String> {
        self.groups
            .read()
            .await
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.groups.read().await.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.groups.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.groups.read().await.is_empty()
    }
}
