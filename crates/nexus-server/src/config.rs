//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the relay can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use nexus_shared::constants::{APP_NAME, DEFAULT_HTTP_PORT, DEFAULT_OUTBOUND_QUEUE};
use nexus_shared::crypto::{parse_transport_key, SymmetricKey};
use nexus_shared::CryptoError;
use thiserror::Error;

/// Settings the relay refuses to start with.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid TRANSPORT_KEY: {0}")]
    TransportKey(#[source] CryptoError),
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for HTTP and the WebSocket endpoint.
    /// Env: `HOST` + `PORT`, or `HTTP_ADDR` for a full socket address.
    /// Default: `0.0.0.0:10000`
    pub http_addr: SocketAddr,

    /// SQLite file holding users, groups and the delivery log.
    /// Env: `DATA_PATH`
    /// Default: `./nexus.db`
    pub data_path: PathBuf,

    /// Pre-shared key for the transport envelope. `None` means plain JSON
    /// frames.
    /// Env: `TRANSPORT_KEY` (64 hex chars, or any passphrase)
    pub transport_key: Option<SymmetricKey>,

    /// Human-readable name for this relay instance.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Capacity of each connection's outbound queue.
    /// Env: `OUTBOUND_QUEUE`
    /// Default: `256`
    pub outbound_queue: usize,

    /// Maximum number of concurrent WebSocket connections (0 = unlimited).
    /// Env: `MAX_CONNECTIONS`
    /// Default: `0`
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            data_path: PathBuf::from("./nexus.db"),
            transport_key: None,
            instance_name: APP_NAME.to_string(),
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            max_connections: 0,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("data_path", &self.data_path)
            .field(
                "transport_key",
                &self.transport_key.as_ref().map(|_| "<redacted>"),
            )
            .field("instance_name", &self.instance_name)
            .field("outbound_queue", &self.outbound_queue)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("PORT") {
            Some(val) => val.parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!(value = %val, "Invalid PORT, using default");
                DEFAULT_HTTP_PORT
            }),
            None => DEFAULT_HTTP_PORT,
        };
        match format!("{host}:{port}").parse::<SocketAddr>() {
            Ok(addr) => config.http_addr = addr,
            Err(_) => tracing::warn!(host = %host, "Invalid HOST, using default"),
        }

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, ignoring");
            }
        }

        if let Some(path) = var("DATA_PATH") {
            if !path.is_empty() {
                config.data_path = PathBuf::from(path);
            }
        }

        // An unusable key is fatal; never fall back to plaintext.
        if let Some(raw) = var("TRANSPORT_KEY") {
            if !raw.is_empty() {
                config.transport_key =
                    Some(parse_transport_key(&raw).map_err(ConfigError::TransportKey)?);
            }
        }

        if let Some(name) = var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(val) = var("OUTBOUND_QUEUE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.outbound_queue = n,
                _ => tracing::warn!(value = %val, "Invalid OUTBOUND_QUEUE, using default"),
            }
        }

        if let Some(val) = var("MAX_CONNECTIONS") {
            match val.parse::<usize>() {
                Ok(n) => config.max_connections = n,
                Err(_) => tracing::warn!(value = %val, "Invalid MAX_CONNECTIONS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 10000).into());
        assert_eq!(config.data_path, PathBuf::from("./nexus.db"));
        assert!(config.transport_key.is_none());
        assert_eq!(config.outbound_queue, 256);
        assert_eq!(config.max_connections, 0);
    }

    #[test]
    fn test_host_and_port() {
        let config = config_from(&[("HOST", "127.0.0.1"), ("PORT", "9000")]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
    }

    #[test]
    fn test_http_addr_overrides_host_port() {
        let config = config_from(&[("PORT", "9000"), ("HTTP_ADDR", "127.0.0.1:7000")]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 7000).into());
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[("PORT", "not-a-port"), ("OUTBOUND_QUEUE", "0")]);
        assert_eq!(config.http_addr.port(), 10000);
        assert_eq!(config.outbound_queue, 256);
    }

    #[test]
    fn test_transport_key_hex_and_passphrase() {
        let hex_key = "ab".repeat(32);
        let config = config_from(&[("TRANSPORT_KEY", &hex_key)]);
        assert_eq!(config.transport_key, Some([0xab; 32]));

        let config = config_from(&[("TRANSPORT_KEY", "correct horse battery staple")]);
        assert!(config.transport_key.is_some());
        assert_ne!(config.transport_key, Some([0xab; 32]));
    }

    #[test]
    fn test_blank_transport_key_refuses_to_start() {
        let result = ServerConfig::from_lookup(|name| {
            (name == "TRANSPORT_KEY").then(|| "   ".to_string())
        });
        assert!(matches!(result, Err(ConfigError::TransportKey(_))));
    }

    #[test]
    fn test_empty_transport_key_means_plaintext() {
        let config = config_from(&[("TRANSPORT_KEY", "")]);
        assert!(config.transport_key.is_none());
    }

    #[test]
    fn test_invalid_max_connections_falls_back() {
        let config = config_from(&[("MAX_CONNECTIONS", "lots")]);
        assert_eq!(config.max_connections, 0);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = config_from(&[("TRANSPORT_KEY", &"ab".repeat(32))]);
        let printed = format!("{config:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("171"));
    }
}
