//! The key-value contract shared by every cache backend.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// Logical namespace of a cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Configuration documents, keyed by document name.
    Config,
    /// Decoded raster windows, keyed by criterion and pixel window.
    RasterWindow,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::RasterWindow => "raster-window",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable key-value store with namespaced keys.
///
/// A missing key is `Ok(None)`, never an error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a value.
    async fn get(&self, namespace: Namespace, key: &str) -> StorageResult<Option<Bytes>>;

    /// Store a value, replacing any previous one.
    async fn put(&self, namespace: Namespace, key: &str, value: Bytes) -> StorageResult<()>;
}

/// A store that never holds anything. Used when caching is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

#[async_trait]
impl KeyValueStore for NullStore {
    async fn get(&self, _namespace: Namespace, _key: &str) -> StorageResult<Option<Bytes>> {
        Ok(None)
    }

    async fn put(&self, _namespace: Namespace, _key: &str, _value: Bytes) -> StorageResult<()> {
        Ok(())
    }
}
