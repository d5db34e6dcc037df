//! Error types for session operations.

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A model was requested with `get()` but is not present in the session.
    #[error("Session model not found: {0}")]
    NotFound(String),

    /// The presented client token is malformed.
    #[error("Invalid session identity: {0}")]
    InvalidIdentity(String),

    /// The stored checksum does not match the current schema of the model.
    #[error("Schema mismatch for session model: {key}")]
    SchemaMismatch { key: String },

    /// The key was already materialized as a different model type this request.
    #[error("Session model '{key}' is not of type {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// Error from the storage adapter.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Encoding or decoding a stored value failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The session cookie could not be built.
    #[error("Cookie error: {0}")]
    Cookie(String),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
