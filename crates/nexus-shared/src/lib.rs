//! # nexus-shared
//!
//! Types shared by the relay crates: the JSON wire protocol, the optional
//! transport envelope (XChaCha20-Poly1305), and common identifiers.

pub mod codec;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod types;

pub use codec::TransportCodec;
pub use error::{CodecError, CryptoError, ProtocolError};
pub use protocol::{ClientMessage, Request, ServerMessage};
pub use types::ConnectionId;
