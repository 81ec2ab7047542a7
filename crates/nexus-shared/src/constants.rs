/// Application name
pub const APP_NAME: &str = "Nexus Relay";

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Maximum inbound WebSocket frame size in bytes (64 MiB).
/// File payloads travel inline, so this is deliberately large.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Default HTTP / WebSocket port
pub const DEFAULT_HTTP_PORT: u16 = 10000;

/// Default capacity of each connection's outbound queue
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// Prefix of the delivery-log placeholder recorded for file transfers
pub const FILE_PLACEHOLDER_PREFIX: &str = "[file]";

/// Key derivation context (BLAKE3) for passphrase-configured transport keys
pub const KDF_CONTEXT_TRANSPORT_KEY: &str = "nexus-relay-transport-key-v1";
