//! # nexus-server
//!
//! WebSocket relay for the Nexus messenger.
//!
//! This binary provides:
//! - **Accounts**: registration and login against argon2 credential hashes
//! - **Presence**: one live session per username, with the online roster
//!   pushed to every connected client on each change
//! - **Routing**: direct messages, file transfers and group fan-out to
//!   whoever is online, plus a persistent per-sender delivery log
//! - **Transport envelope**: optional XChaCha20-Poly1305 sealing of every
//!   frame under a pre-shared key
//! - **REST API** (axum) for health checks and instance info

mod api;
mod config;
mod error;
mod registry;
mod relay;
mod router;
mod session;
mod transport;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use nexus_shared::TransportCodec;
use nexus_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::relay::Relay;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,nexus_server=debug")),
        )
        .init();

    info!("Starting Nexus relay server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env()?;
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open durable state
    // -----------------------------------------------------------------------
    let database = Arc::new(Database::open_at(&config.data_path)?);
    info!(path = %database.path().display(), "Database opened");

    let relay = Arc::new(Relay::open(database)?);

    let codec = TransportCodec::from_key(config.transport_key);
    if codec.is_encrypted() {
        info!("Transport encryption enabled");
    } else {
        info!("Transport encryption disabled, frames are plain JSON");
    }

    let http_addr = config.http_addr;
    let app_state = AppState::new(relay, codec, config);

    // -----------------------------------------------------------------------
    // 4. Run the HTTP/WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
