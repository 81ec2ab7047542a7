//! Connection-boundary codec.
//!
//! Turns raw frames into [`ClientMessage`]s and [`ServerMessage`]s into
//! frames. When a transport key is configured every unit is wrapped in the
//! XChaCha20-Poly1305 envelope from [`crate::crypto`]; the relay itself holds
//! the key, so this is confidentiality on the wire only.

use crate::crypto::{self, SymmetricKey};
use crate::error::CodecError;
use crate::protocol::{ClientMessage, ServerMessage};

#[derive(Clone)]
pub struct TransportCodec {
    key: Option<SymmetricKey>,
}

impl TransportCodec {
    /// Plain JSON frames.
    pub fn plaintext() -> Self {
        Self { key: None }
    }

    /// Sealed frames under a pre-shared key.
    pub fn encrypted(key: SymmetricKey) -> Self {
        Self { key: Some(key) }
    }

    pub fn from_key(key: Option<SymmetricKey>) -> Self {
        Self { key }
    }

    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }

    /// Serialize an outbound message into the text of one frame.
    pub fn encode(&self, message: &ServerMessage) -> Result<String, CodecError> {
        let json = serde_json::to_string(message)?;
        match &self.key {
            Some(key) => Ok(crypto::seal(key, json.as_bytes())?),
            None => Ok(json),
        }
    }

    /// Decode a text frame: JSON, or base64(nonce || ciphertext) when encrypted.
    pub fn decode_text(&self, text: &str) -> Result<ClientMessage, CodecError> {
        match &self.key {
            Some(key) => {
                let plaintext = crypto::open(key, text)?;
                Ok(serde_json::from_slice(&plaintext)?)
            }
            None => Ok(serde_json::from_str(text)?),
        }
    }

    /// Decode a binary frame: UTF-8 JSON, or raw nonce || ciphertext when
    /// encrypted.
    pub fn decode_binary(&self, data: &[u8]) -> Result<ClientMessage, CodecError> {
        match &self.key {
            Some(key) => {
                let plaintext = crypto::decrypt(key, data)?;
                Ok(serde_json::from_slice(&plaintext)?)
            }
            None => {
                let text = String::from_utf8(data.to_vec())?;
                Ok(serde_json::from_str(&text)?)
            }
        }
    }
}

impl std::fmt::Debug for TransportCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportCodec")
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}
