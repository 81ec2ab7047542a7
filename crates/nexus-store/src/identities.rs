//! Registered identities: username -> argon2 credential hash.

use std::collections::BTreeMap;
use std::sync::Arc;

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::backend::{load_collection, save_collection, DurableStore, USERS};
use crate::error::{IdentityError, Result as StoreResult};

pub struct IdentityStore {
    backend: Arc<dyn DurableStore>,
    users: RwLock<BTreeMap<String, String>>,
}

impl IdentityStore {
    /// Load the users collection from `backend`.
    pub fn load(backend: Arc<dyn DurableStore>) -> StoreResult<Self> {
        let users: BTreeMap<String, String> = load_collection(backend.as_ref(), USERS)?;
        info!(count = users.len(), "Identity store loaded");
        Ok(Self {
            backend,
            users: RwLock::new(users),
        })
    }

    /// Register a new identity.
    ///
    /// The record only becomes visible once the whole collection has been
    /// persisted; if persisting fails the insert is undone before the write
    /// lock is released.
    pub async fn register(&self, username: &str, password: &str) -> Result<(), IdentityError> {
        if username.trim().is_empty() {
            return Err(IdentityError::InvalidInput("username"));
        }
        if password.is_empty() {
            return Err(IdentityError::InvalidInput("password"));
        }

        // Cheap rejection before paying for a hash.
        if self.users.read().await.contains_key(username) {
            return Err(IdentityError::AlreadyExists);
        }

        let hash = hash_password(password.to_string()).await?;

        let mut users = self.users.write().await;
        if users.contains_key(username) {
            return Err(IdentityError::AlreadyExists);
        }

        users.insert(username.to_string(), hash);
        let saved = save_collection(&self.backend, USERS, &*users).await;
        if let Err(e) = saved {
            users.remove(username);
            return Err(e.into());
        }

        info!(user = %username, "Identity registered");
        Ok(())
    }

    /// Check `password` against the stored hash for `username`.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<(), IdentityError> {
        let stored = self.users.read().await.get(username).cloned();
        let Some(stored) = stored else {
            debug!(user = %username, "Authentication failed: unknown user");
            return Err(IdentityError::NotFound);
        };

        if verify_password(password.to_string(), stored).await? {
            Ok(())
        } else {
            debug!(user = %username, "Authentication failed: wrong credential");
            Err(IdentityError::WrongCredential)
        }
    }

    pub async fn contains(&self, username: &str) -> bool {
        self.users.read().await.contains_key(username)
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    #[cfg(test)]
    async fn credential_hash(&self, username: &str) -> Option<String> {
        self.users.read().await.get(username).cloned()
    }
}

// argon2 is deliberately slow; keep it off the async workers.
async fn hash_password(password: String) -> Result<String, IdentityError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| IdentityError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| IdentityError::Hashing(e.to_string()))?
}

async fn verify_password(password: String, stored: String) -> Result<bool, IdentityError> {
    tokio::task::spawn_blocking(move || {
        let parsed =
            PasswordHash::new(&stored).map_err(|e| IdentityError::Hashing(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| IdentityError::Hashing(e.to_string()))?
}
