use thiserror::Error;

/// Errors produced by the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A collection could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A thread panicked while holding the backend lock.
    #[error("Storage backend lock poisoned")]
    LockPoisoned,

    /// The blocking write task panicked or was cancelled.
    #[error("Background write failed: {0}")]
    Background(#[from] tokio::task::JoinError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Outcomes of identity registration and authentication.
///
/// `NotFound` and `WrongCredential` render identically so callers cannot
/// leak which half of the credentials was wrong.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("invalid input: {0} must not be empty")]
    InvalidInput(&'static str),

    #[error("username already exists")]
    AlreadyExists,

    #[error("invalid credentials")]
    NotFound,

    #[error("invalid credentials")]
    WrongCredential,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum GroupError {
    #[error("invalid input: group name must not be empty")]
    InvalidInput,

    #[error("group already exists")]
    AlreadyExists,

    #[error(transparent)]
    Store(#[from] StoreError),
}
