//! Per-connection session lifecycle.
//!
//! ```text
//! Unauthenticated --login--> Authenticated --close/logout--> Closed
//! ```
//!
//! A [`Session`] is owned by the connection task and driven one inbound
//! message at a time, which gives per-connection ordering for free.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use nexus_shared::crypto::generate_session_token;
use nexus_shared::{ClientMessage, Request, ServerMessage};
use nexus_store::IdentityError;

use crate::error::ServerError;
use crate::registry::ConnectionHandle;
use crate::relay::Relay;
use crate::router;

const SUPERSEDED: &str = "session superseded by a newer login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated {
        username: String,
        token: String,
        established_at: DateTime<Utc>,
    },
    Closed,
}

pub struct Session {
    relay: Arc<Relay>,
    handle: ConnectionHandle,
    state: SessionState,
}

impl Session {
    pub fn new(relay: Arc<Relay>, handle: ConnectionHandle) -> Self {
        Self {
            relay,
            handle,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn username(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { username, .. } => Some(username),
            _ => None,
        }
    }

    /// Process one decoded inbound message.
    ///
    /// Request-level failures become error replies. An `Err` means the
    /// connection itself is unusable and should be torn down.
    pub async fn handle(&mut self, message: ClientMessage) -> Result<(), ServerError> {
        let request = match message.into_request() {
            Ok(request) => request,
            Err(e) => {
                debug!(conn = %self.handle.id(), error = %e, "Rejecting invalid request");
                return self.reply(ServerMessage::error(format!("invalid input: {e}"))).await;
            }
        };

        debug!(conn = %self.handle.id(), kind = request.kind(), "Handling request");

        match request {
            Request::Register { username, password } => self.register(&username, &password).await,
            Request::Login { username, password } => self.login(&username, &password).await,
            Request::Logout => self.logout().await,
            content => {
                let Some(sender) = self.username().map(str::to_string) else {
                    return self.reply(ServerMessage::error("not authenticated")).await;
                };
                if !self.holds_binding(&sender).await {
                    info!(conn = %self.handle.id(), user = %sender, "Superseded session closed");
                    self.state = SessionState::Closed;
                    return self.reply(ServerMessage::error(SUPERSEDED)).await;
                }
                match router::dispatch(&self.relay, &sender, content).await {
                    Some(reply) => self.reply(reply).await,
                    None => Ok(()),
                }
            }
        }
    }

    async fn register(&mut self, username: &str, password: &str) -> Result<(), ServerError> {
        let reply = match self.relay.identities.register(username, password).await {
            Ok(()) => ServerMessage::success("registered"),
            Err(e @ (IdentityError::Store(_) | IdentityError::Hashing(_))) => {
                error!(user = %username, error = %e, "Registration failed");
                ServerMessage::error("internal error")
            }
            Err(e) => ServerMessage::error(e.to_string()),
        };
        self.reply(reply).await
    }

    async fn login(&mut self, username: &str, password: &str) -> Result<(), ServerError> {
        match &self.state {
            SessionState::Unauthenticated => {}
            SessionState::Authenticated { .. } => {
                return self.reply(ServerMessage::error("already authenticated")).await;
            }
            SessionState::Closed => {
                return self.reply(ServerMessage::error("session closed")).await;
            }
        }

        match self.relay.identities.authenticate(username, password).await {
            Ok(()) => {}
            Err(IdentityError::Hashing(e)) => {
                error!(user = %username, error = %e, "Credential check failed");
                return self.reply(ServerMessage::error("internal error")).await;
            }
            Err(e) => {
                info!(conn = %self.handle.id(), user = %username, "Login rejected");
                return self.reply(ServerMessage::error(e.to_string())).await;
            }
        }

        let token = generate_session_token();
        self.state = SessionState::Authenticated {
            username: username.to_string(),
            token: token.clone(),
            established_at: Utc::now(),
        };

        // Reply first so the client sees login_success before the roster.
        self.reply(ServerMessage::LoginSuccess { token }).await?;

        if let Some(previous) = self.relay.registry.bind(username, self.handle.clone()).await {
            warn!(
                user = %username,
                superseded = %previous.id(),
                "Login replaced an existing session"
            );
            previous.deliver(ServerMessage::error(SUPERSEDED));
        }
        Ok(())
    }

    /// Whether the registry still routes `username` to this connection.
    async fn holds_binding(&self, username: &str) -> bool {
        self.relay
            .registry
            .lookup(username)
            .await
            .is_some_and(|bound| bound.id() == self.handle.id())
    }

    async fn logout(&mut self) -> Result<(), ServerError> {
        if !matches!(self.state, SessionState::Authenticated { .. }) {
            return self.reply(ServerMessage::error("not authenticated")).await;
        }
        self.close().await;
        self.reply(ServerMessage::success("logged out")).await
    }

    /// Tear the session down. Idempotent.
    pub async fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        if let SessionState::Authenticated {
            username,
            established_at,
            ..
        } = previous
        {
            self.relay.registry.unbind(&username, self.handle.id()).await;
            let duration = Utc::now() - established_at;
            info!(
                conn = %self.handle.id(),
                user = %username,
                secs = duration.num_seconds(),
                "Session closed"
            );
        }
    }

    async fn reply(&self, message: ServerMessage) -> Result<(), ServerError> {
        self.handle
            .send(message)
            .await
            .map_err(|_| ServerError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::relay::testing::{connection, drain, drain_content, memory_relay};

    fn msg(value: serde_json::Value) -> ClientMessage {
        serde_json::from_value(value).unwrap()
    }

    fn roster(users: &[&str]) -> ServerMessage {
        ServerMessage::OnlineUsers {
            users: users.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn logged_in(
        relay: &Arc<Relay>,
        username: &str,
    ) -> (Session, mpsc::Receiver<ServerMessage>) {
        let (handle, mut rx) = connection();
        let mut session = Session::new(relay.clone(), handle);
        if !relay.identities.contains(username).await {
            relay.identities.register(username, "pw").await.unwrap();
        }
        session
            .handle(msg(json!({"type": "login", "username": username, "password": "pw"})))
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::LoginSuccess { .. })
        ));
        (session, rx)
    }

    #[tokio::test]
    async fn test_register_replies() {
        let relay = memory_relay();
        let (handle, mut rx) = connection();
        let mut session = Session::new(relay.clone(), handle);

        let register = json!({"type": "register", "username": "alice", "password": "pw"});
        session.handle(msg(register.clone())).await.unwrap();
        session.handle(msg(register)).await.unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMessage::success("registered"),
                ServerMessage::error("username already exists"),
            ]
        );
        assert_eq!(session.state(), &SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_register_empty_username() {
        let relay = memory_relay();
        let (handle, mut rx) = connection();
        let mut session = Session::new(relay, handle);

        session
            .handle(msg(json!({"type": "register", "username": "", "password": "pw"})))
            .await
            .unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::Error { message } if message.contains("username")
        ));
    }

    #[tokio::test]
    async fn test_login_binds_and_broadcasts() {
        let relay = memory_relay();
        let (session, mut rx) = logged_in(&relay, "alice").await;

        assert_eq!(session.username(), Some("alice"));
        assert!(relay.registry.lookup("alice").await.is_some());
        assert_eq!(drain(&mut rx), vec![roster(&["alice"])]);
    }

    #[tokio::test]
    async fn test_session_tokens_differ() {
        let relay = memory_relay();
        let (first, _rx1) = logged_in(&relay, "alice").await;
        let (second, _rx2) = logged_in(&relay, "bob").await;

        let token = |s: &Session| match s.state() {
            SessionState::Authenticated { token, .. } => token.clone(),
            other => panic!("unexpected state {other:?}"),
        };
        assert_ne!(token(&first), token(&second));
    }

    #[tokio::test]
    async fn test_bad_login_is_generic() {
        let relay = memory_relay();
        relay.identities.register("alice", "pw").await.unwrap();
        let (handle, mut rx) = connection();
        let mut session = Session::new(relay.clone(), handle);

        session
            .handle(msg(json!({"type": "login", "username": "alice", "password": "nope"})))
            .await
            .unwrap();
        session
            .handle(msg(json!({"type": "login", "username": "nobody", "password": "pw"})))
            .await
            .unwrap();

        let replies = drain(&mut rx);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], replies[1]);
        assert_eq!(replies[0], ServerMessage::error("invalid credentials"));
        assert_eq!(session.state(), &SessionState::Unauthenticated);
        assert!(relay.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_second_login_on_same_connection_rejected() {
        let relay = memory_relay();
        relay.identities.register("bob", "pw").await.unwrap();
        let (mut session, mut rx) = logged_in(&relay, "alice").await;
        drain(&mut rx);

        session
            .handle(msg(json!({"type": "login", "username": "bob", "password": "pw"})))
            .await
            .unwrap();

        assert_eq!(drain(&mut rx), vec![ServerMessage::error("already authenticated")]);
        assert_eq!(session.username(), Some("alice"));
        assert!(relay.registry.lookup("bob").await.is_none());
    }

    #[tokio::test]
    async fn test_content_requires_login() {
        let relay = memory_relay();
        let (handle, mut rx) = connection();
        let mut session = Session::new(relay.clone(), handle);

        session
            .handle(msg(json!({"type": "direct", "from": "alice", "to": "bob", "msg": "hi"})))
            .await
            .unwrap();
        session
            .handle(msg(json!({"type": "createGroup", "group": "g", "members": ["a"]})))
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMessage::error("not authenticated"),
                ServerMessage::error("not authenticated"),
            ]
        );
        assert!(relay.deliveries.history("alice").await.is_empty());
        assert!(!relay.groups.contains("g").await);
    }

    #[tokio::test]
    async fn test_missing_field_reply() {
        let relay = memory_relay();
        let (mut session, mut rx) = logged_in(&relay, "alice").await;
        drain(&mut rx);

        session
            .handle(msg(json!({"type": "direct", "msg": "to whom?"})))
            .await
            .unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::error("invalid input: missing required field: to")]
        );
    }

    #[tokio::test]
    async fn test_spoofed_sender_ignored() {
        let relay = memory_relay();
        let (mut alice, mut alice_rx) = logged_in(&relay, "alice").await;
        let (_bob, mut bob_rx) = logged_in(&relay, "bob").await;
        drain(&mut alice_rx);

        alice
            .handle(msg(json!({"type": "private_msg", "from": "carol", "to": "bob", "msg": "hey"})))
            .await
            .unwrap();

        assert_eq!(
            drain_content(&mut bob_rx),
            vec![ServerMessage::Private {
                from: "alice".into(),
                msg: "hey".into()
            }]
        );
        assert!(relay.deliveries.history("carol").await.is_empty());
        assert_eq!(relay.deliveries.history("alice").await.len(), 1);
    }

    #[tokio::test]
    async fn test_close_unbinds_and_notifies_others_once() {
        let relay = memory_relay();
        let (mut alice, _alice_rx) = logged_in(&relay, "alice").await;
        let (_bob, mut bob_rx) = logged_in(&relay, "bob").await;
        let (_carol, mut carol_rx) = logged_in(&relay, "carol").await;
        drain(&mut bob_rx);
        drain(&mut carol_rx);

        alice.close().await;
        alice.close().await;

        assert_eq!(alice.state(), &SessionState::Closed);
        assert!(relay.registry.lookup("alice").await.is_none());
        assert_eq!(drain(&mut bob_rx), vec![roster(&["bob", "carol"])]);
        assert_eq!(drain(&mut carol_rx), vec![roster(&["bob", "carol"])]);
    }

    #[tokio::test]
    async fn test_superseded_session_close_keeps_new_binding() {
        let relay = memory_relay();
        let (mut old, _old_rx) = logged_in(&relay, "alice").await;
        let (new, _new_rx) = logged_in(&relay, "alice").await;

        assert_eq!(relay.registry.len().await, 1);
        old.close().await;

        let bound = relay.registry.lookup("alice").await.unwrap();
        assert_eq!(bound.id(), new.handle.id());
    }

    #[tokio::test]
    async fn test_superseded_session_cannot_route() {
        let relay = memory_relay();
        let (mut old, mut old_rx) = logged_in(&relay, "alice").await;
        let (_new, _new_rx) = logged_in(&relay, "alice").await;
        let (_bob, mut bob_rx) = logged_in(&relay, "bob").await;
        drain(&mut bob_rx);

        // The old connection is told as soon as the new login lands.
        assert!(drain(&mut old_rx).contains(&ServerMessage::error(SUPERSEDED)));

        old.handle(msg(json!({"type": "direct", "to": "bob", "msg": "from the old tab"})))
            .await
            .unwrap();
        old.handle(msg(json!({"type": "createGroup", "group": "g", "members": ["bob"]})))
            .await
            .unwrap();

        assert_eq!(old.state(), &SessionState::Closed);
        assert_eq!(
            drain(&mut old_rx),
            vec![
                ServerMessage::error(SUPERSEDED),
                ServerMessage::error("not authenticated"),
            ]
        );
        assert!(drain_content(&mut bob_rx).is_empty());
        assert!(relay.deliveries.history("alice").await.is_empty());
        assert!(!relay.groups.contains("g").await);
    }

    #[tokio::test]
    async fn test_logout() {
        let relay = memory_relay();
        let (mut alice, mut alice_rx) = logged_in(&relay, "alice").await;
        drain(&mut alice_rx);

        alice.handle(msg(json!({"type": "logout"}))).await.unwrap();
        assert_eq!(drain(&mut alice_rx), vec![ServerMessage::success("logged out")]);
        assert!(relay.registry.is_empty().await);

        alice
            .handle(msg(json!({"type": "direct", "to": "bob", "msg": "still here?"})))
            .await
            .unwrap();
        assert_eq!(drain(&mut alice_rx), vec![ServerMessage::error("not authenticated")]);

        alice
            .handle(msg(json!({"type": "login", "username": "alice", "password": "pw"})))
            .await
            .unwrap();
        assert_eq!(drain(&mut alice_rx), vec![ServerMessage::error("session closed")]);
    }

    #[tokio::test]
    async fn test_reply_to_closed_connection_is_error() {
        let relay = memory_relay();
        let (handle, rx) = connection();
        drop(rx);
        let mut session = Session::new(relay, handle);

        let result = session
            .handle(msg(json!({"type": "register", "username": "a", "password": "pw"})))
            .await;
        assert!(matches!(result, Err(ServerError::ConnectionClosed)));
    }
}
