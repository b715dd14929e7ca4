//! Redis-backed key-value store that persists across sessions.

use async_trait::async_trait;
use bytes::Bytes;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::time::Duration;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::kv::{KeyValueStore, Namespace};

/// Redis cache client.
///
/// Keys are stored as `nbs:{namespace}:{key}`.
pub struct RedisStore {
    conn: MultiplexedConnection,
    ttl: Option<Duration>,
}

impl RedisStore {
    /// Connect to Redis. Entries never expire unless a TTL is set.
    pub async fn connect(redis_url: &str) -> StorageResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| StorageError::Connection(format!("Redis connection failed: {}", e)))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StorageError::Connection(format!("Redis connection failed: {}", e)))?;

        Ok(Self { conn, ttl: None })
    }

    /// Expire entries after `ttl`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    fn redis_key(namespace: Namespace, key: &str) -> String {
        format!("nbs:{}:{}", namespace, key)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, namespace: Namespace, key: &str) -> StorageResult<Option<Bytes>> {
        let key_str = Self::redis_key(namespace, key);
        let mut conn = self.conn.clone();

        let result: Option<Vec<u8>> = conn
            .get(&key_str)
            .await
            .map_err(|e| StorageError::Get(format!("{}: {}", key_str, e)))?;

        debug!(key = %key_str, hit = result.is_some(), "Redis cache lookup");
        Ok(result.map(Bytes::from))
    }

    async fn put(&self, namespace: Namespace, key: &str, value: Bytes) -> StorageResult<()> {
        let key_str = Self::redis_key(namespace, key);
        let mut conn = self.conn.clone();

        match self.ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(&key_str, value.as_ref(), ttl.as_secs())
                .await
                .map_err(|e| StorageError::Put(format!("{}: {}", key_str, e)))?,
            None => conn
                .set::<_, _, ()>(&key_str, value.as_ref())
                .await
                .map_err(|e| StorageError::Put(format!("{}: {}", key_str, e)))?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_key_format() {
        assert_eq!(
            RedisStore::redis_key(Namespace::RasterWindow, "wet_soil:0:0:4:4"),
            "nbs:raster-window:wet_soil:0:0:4:4"
        );
        assert_eq!(
            RedisStore::redis_key(Namespace::Config, "solutionCriteria"),
            "nbs:config:solutionCriteria"
        );
    }
}
