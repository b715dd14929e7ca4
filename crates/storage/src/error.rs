//! Error types for cache backends.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a cache backend.
///
/// Callers treat these as cache misses; a failing cache never blocks
/// configuration loading or scoring.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cache connection failed: {0}")]
    Connection(String),

    #[error("cache get failed: {0}")]
    Get(String),

    #[error("cache put failed: {0}")]
    Put(String),
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() {
            Self::Connection(err.to_string())
        } else {
            Self::Get(err.to_string())
        }
    }
}
