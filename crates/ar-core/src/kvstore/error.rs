//! Key/value store error types.

use thiserror::Error;

/// Errors that can occur during key/value store operations.
#[derive(Error, Debug, Clone)]
pub enum KvStoreError {
    /// The backing storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stored data could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for key/value store operations.
pub type KvStoreResult<T> = Result<T, KvStoreError>;
