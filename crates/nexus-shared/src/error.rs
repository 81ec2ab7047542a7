use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("Invalid transport encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Invalid transport key: {0}")]
    InvalidKey(String),
}

/// Failure to turn a raw frame into a message, or a message into a frame.
/// On the inbound side any of these means the unit is discarded.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Invalid UTF-8 in frame")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// A well-formed message that is missing something it needs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}
