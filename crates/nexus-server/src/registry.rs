//! Who is online: username -> live connection handle.
//!
//! Every binding change rebroadcasts the roster while the write lock is still
//! held, so each connected client sees roster updates in mutation order and
//! every update reflects exactly one bind or unbind.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use nexus_shared::{ConnectionId, ServerMessage};

/// Writable end of one connection's outbound queue.
///
/// Cloning is cheap. The registry never closes a connection; the transport
/// task that owns the socket does.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<ServerMessage>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<ServerMessage>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue `message` without waiting. A full or closed queue drops it.
    pub fn deliver(&self, message: ServerMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(conn = %self.id, "Dropping message for slow connection");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(conn = %self.id, "Dropping message for closed connection");
                false
            }
        }
    }

    /// Queue `message`, waiting for space. Used for replies to the
    /// connection's own requests.
    pub async fn send(&self, message: ServerMessage) -> Result<(), ServerMessage> {
        self.tx.send(message).await.map_err(|e| e.0)
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    bindings: RwLock<HashMap<String, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `username` to `handle`, replacing any previous binding.
    ///
    /// Returns the superseded handle. It is not closed here.
    pub async fn bind(&self, username: &str, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let mut bindings = self.bindings.write().await;
        let conn = handle.id();
        let previous = bindings.insert(username.to_string(), handle);

        match &previous {
            Some(old) => info!(
                user = %username,
                conn = %conn,
                superseded = %old.id(),
                online = bindings.len(),
                "Session superseded"
            ),
            None => info!(user = %username, conn = %conn, online = bindings.len(), "User online"),
        }

        broadcast_roster(&bindings);
        previous
    }

    /// Remove the binding for `username` if it still belongs to `conn`.
    ///
    /// Closing a connection whose login was superseded must not evict the
    /// newer session, hence the connection check. Returns whether a binding
    /// was removed; only then is the roster rebroadcast.
    pub async fn unbind(&self, username: &str, conn: ConnectionId) -> bool {
        let mut bindings = self.bindings.write().await;
        match bindings.get(username) {
            Some(handle) if handle.id() == conn => {
                bindings.remove(username);
                info!(user = %username, conn = %conn, online = bindings.len(), "User offline");
                broadcast_roster(&bindings);
                true
            }
            Some(_) => {
                debug!(user = %username, conn = %conn, "Unbind skipped: binding belongs to a newer session");
                false
            }
            None => false,
        }
    }

    /// Remove whatever username is bound to `conn`. Used when a connection
    /// dies without its session being closed.
    pub async fn unbind_connection(&self, conn: ConnectionId) -> Option<String> {
        let mut bindings = self.bindings.write().await;
        let username = bindings
            .iter()
            .find(|(_, handle)| handle.id() == conn)
            .map(|(name, _)| name.clone())?;
        bindings.remove(&username);
        info!(user = %username, conn = %conn, online = bindings.len(), "User offline");
        broadcast_roster(&bindings);
        Some(username)
    }

    pub async fn lookup(&self, username: &str) -> Option<ConnectionHandle> {
        self.bindings.read().await.get(username).cloned()
    }

    /// Bound usernames, sorted.
    pub async fn snapshot(&self) -> Vec<String> {
        sorted_names(&*self.bindings.read().await)
    }

    /// Handles for every bound username in `members`, taken under one read
    /// lock.
    pub async fn lookup_many<'a, I>(&self, members: I) -> Vec<(String, ConnectionHandle)>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let bindings = self.bindings.read().await;
        members
            .into_iter()
            .filter_map(|name| bindings.get(name).map(|h| (name.clone(), h.clone())))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.bindings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bindings.read().await.is_empty()
    }
}

fn sorted_names(bindings: &HashMap<String, ConnectionHandle>) -> Vec<String> {
    let mut names: Vec<String> = bindings.keys().cloned().collect();
    names.sort();
    names
}

fn broadcast_roster(bindings: &HashMap<String, ConnectionHandle>) {
    let roster = ServerMessage::OnlineUsers {
        users: sorted_names(bindings),
    };
    for handle in bindings.values() {
        handle.deliver(roster.clone());
    }
}
