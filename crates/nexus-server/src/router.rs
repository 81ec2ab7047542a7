//! Content routing: direct, file, group and group-creation requests.
//!
//! Routing depends only on the request, the authenticated sender and the
//! current registry / group state. Deliveries are fire-and-forget: offline
//! recipients and unknown groups are dropped silently, and a slow recipient
//! only loses its own copy.

use tracing::{debug, error, warn};

use nexus_shared::constants::FILE_PLACEHOLDER_PREFIX;
use nexus_shared::{Request, ServerMessage};
use nexus_store::{DeliveryRecord, GroupError};

use crate::relay::Relay;

/// Route one request from `sender`. Returns the reply for the sender, if the
/// request kind has one.
pub async fn dispatch(relay: &Relay, sender: &str, request: Request) -> Option<ServerMessage> {
    match request {
        Request::Direct { to, text } => {
            let message = ServerMessage::Private {
                from: sender.to_string(),
                msg: text.clone(),
            };
            deliver_direct(relay, sender, &to, message).await;
            record(relay, DeliveryRecord::new(sender, to, text)).await;
            None
        }

        Request::File { to, filename, blob } => {
            let placeholder = format!("{FILE_PLACEHOLDER_PREFIX} {filename}");
            let message = ServerMessage::File {
                from: sender.to_string(),
                filename,
                file: blob,
            };
            deliver_direct(relay, sender, &to, message).await;
            record(relay, DeliveryRecord::new(sender, to, placeholder)).await;
            None
        }

        Request::GroupMessage { group, text } => {
            let message = ServerMessage::GroupMsg {
                group: group.clone(),
                from: sender.to_string(),
                msg: text,
            };
            deliver_group(relay, sender, &group, message).await;
            None
        }

        Request::GroupFile {
            group,
            filename,
            blob,
        } => {
            let message = ServerMessage::GroupFile {
                group: group.clone(),
                from: sender.to_string(),
                filename,
                file: blob,
            };
            deliver_group(relay, sender, &group, message).await;
            None
        }

        Request::CreateGroup { group, members } => Some(create_group(relay, &group, members).await),

        other => {
            warn!(kind = other.kind(), "Session request reached the router");
            None
        }
    }
}

async fn deliver_direct(relay: &Relay, sender: &str, to: &str, message: ServerMessage) {
    match relay.registry.lookup(to).await {
        Some(handle) => {
            if handle.deliver(message) {
                debug!(from = %sender, to = %to, "Direct delivery queued");
            }
        }
        None => debug!(from = %sender, to = %to, "Recipient offline, dropping"),
    }
}

async fn deliver_group(relay: &Relay, sender: &str, group: &str, message: ServerMessage) {
    let members = relay.groups.members_of(group).await;
    if members.is_empty() {
        debug!(from = %sender, group = %group, "Unknown or empty group, dropping");
        return;
    }

    let targets = relay
        .registry
        .lookup_many(members.iter().filter(|member| member.as_str() != sender))
        .await;

    let mut queued = 0usize;
    for (_, handle) in &targets {
        if handle.deliver(message.clone()) {
            queued += 1;
        }
    }

    debug!(
        from = %sender,
        group = %group,
        members = members.len(),
        online = targets.len(),
        queued,
        "Group delivery"
    );
}

async fn record(relay: &Relay, entry: DeliveryRecord) {
    if let Err(e) = relay.deliveries.append(entry).await {
        warn!(error = %e, "Failed to persist delivery record");
    }
}

async fn create_group(relay: &Relay, group: &str, members: Vec<String>) -> ServerMessage {
    match relay.groups.create(group, members).await {
        Ok(_) => ServerMessage::success(format!("group '{group}' created")),
        Err(GroupError::Store(e)) => {
            error!(group = %group, error = %e, "Failed to persist group");
            ServerMessage::error("internal error")
        }
        Err(e) => ServerMessage::error(e.to_string()),
    }
}
