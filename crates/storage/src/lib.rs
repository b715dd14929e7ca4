//! Persistent cache abstractions for the suitability engine.
//!
//! Provides one key-value contract with two logical namespaces and
//! interchangeable backends:
//! - In-memory LRU for single-process sessions and tests
//! - Redis for a cache that survives across sessions

pub mod error;
pub mod kv;
pub mod memory;
pub mod redis_store;

pub use error::{StorageError, StorageResult};
pub use kv::{KeyValueStore, Namespace, NullStore};
pub use memory::{MemoryStore, MemoryStoreStats};
pub use redis_store::RedisStore;
