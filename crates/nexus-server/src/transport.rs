//! WebSocket transport: one reader task and one writer task per connection.
//!
//! The reader decodes frames and drives the connection's [`Session`] in
//! arrival order. The writer drains the bounded outbound queue, encodes each
//! message with the transport codec and writes it to the socket, so a slow
//! socket only ever backs up its own queue.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use nexus_shared::constants::MAX_FRAME_SIZE;
use nexus_shared::{ConnectionId, ServerMessage, TransportCodec};

use crate::api::AppState;
use crate::error::ServerError;
use crate::registry::ConnectionHandle;
use crate::relay::Relay;
use crate::session::Session;

/// `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Result<Response, ServerError> {
    let slot = ConnectionSlot::acquire(state.connections.clone(), state.config.max_connections)
        .ok_or_else(|| {
            warn!(peer = %peer, "Rejecting connection: limit reached");
            ServerError::TooManyConnections(state.config.max_connections)
        })?;

    Ok(ws
        .max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state, peer, slot)))
}

/// Counts a live connection for as long as it is held.
struct ConnectionSlot {
    counter: Arc<AtomicUsize>,
}

impl ConnectionSlot {
    fn acquire(counter: Arc<AtomicUsize>, max: usize) -> Option<Self> {
        let previous = counter.fetch_add(1, Ordering::SeqCst);
        if max > 0 && previous >= max {
            counter.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(Self { counter })
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, peer: SocketAddr, _slot: ConnectionSlot) {
    let id = ConnectionId::new();
    info!(conn = %id, peer = %peer, "Connection opened");

    let (mut ws_sender, receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(state.config.outbound_queue);

    let codec = state.codec.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let frame = match codec.encode(&message) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(conn = %id, error = %e, "Failed to encode outbound message");
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::Text(frame)).await {
                debug!(conn = %id, error = %e, "WebSocket write failed");
                break;
            }
        }
    });

    let session = Session::new(state.relay.clone(), ConnectionHandle::new(id, out_tx));
    let reader = tokio::spawn(read_loop(id, receiver, state.codec.clone(), session));
    reap(&state.relay, id, reader.await).await;
    writer.abort();

    info!(conn = %id, peer = %peer, "Connection closed");
}

async fn read_loop(
    id: ConnectionId,
    mut receiver: SplitStream<WebSocket>,
    codec: TransportCodec,
    mut session: Session,
) {
    while let Some(frame) = receiver.next().await {
        let decoded = match frame {
            Ok(Message::Text(text)) => codec.decode_text(&text),
            Ok(Message::Binary(data)) => codec.decode_binary(&data),
            Ok(Message::Close(_)) => {
                debug!(conn = %id, "Client closed the connection");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                debug!(conn = %id, error = %e, "WebSocket read failed");
                break;
            }
        };

        let message = match decoded {
            Ok(message) => message,
            Err(e) => {
                debug!(conn = %id, error = %e, "Discarding undecodable frame");
                continue;
            }
        };

        if let Err(e) = session.handle(message).await {
            debug!(conn = %id, error = %e, "Session ended");
            break;
        }
    }

    session.close().await;
}

/// A reader that died without closing its session still owns a binding.
async fn reap(relay: &Relay, id: ConnectionId, outcome: Result<(), JoinError>) {
    if let Err(e) = outcome {
        error!(conn = %id, error = %e, "Connection task failed");
        if let Some(username) = relay.registry.unbind_connection(id).await {
            warn!(conn = %id, user = %username, "Removed binding of failed connection");
        }
    }
}
