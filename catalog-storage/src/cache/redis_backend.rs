//! Redis-backed cache implementation.
//!
//! Uses a multiplexed [`ConnectionManager`] so a single connection is shared
//! by every request worker and transparently re-established on failure.
//!
//! # Pattern Lookup
//!
//! Wildcard lookups run server-side `SCAN ... MATCH` in a cursor loop.
//! `find_first` stops at the first page that yields a key.
//!
//! # Expiry
//!
//! - [`Expiry::After`] maps to `SET key value PX <ms>`
//! - [`Expiry::KeepExisting`] maps to `SET key value KEEPTTL`

use async_trait::async_trait;
use catalog_core::{CacheError, CatalogError, CatalogResult};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::traits::{Expiry, KeyValueStore};

/// Keys requested per `SCAN` page.
const DEFAULT_SCAN_COUNT: usize = 100;

/// Error type for Redis cache operations.
#[derive(Debug, thiserror::Error)]
pub enum RedisCacheError {
    /// Invalid connection URL.
    #[error("Invalid Redis URL: {0}")]
    InvalidUrl(String),

    /// Failed to reach the server.
    #[error("Redis connection failed: {0}")]
    Connection(String),

    /// A command failed.
    #[error("Redis command failed: {0}")]
    Command(#[from] redis::RedisError),
}

/// Convert RedisCacheError to CatalogError.
impl From<RedisCacheError> for CatalogError {
    fn from(e: RedisCacheError) -> Self {
        CatalogError::Cache(CacheError::Unavailable {
            reason: e.to_string(),
        })
    }
}

/// Redis-backed [`KeyValueStore`].
#[derive(Clone)]
pub struct RedisKeyValueStore {
    conn: ConnectionManager,
    scan_count: usize,
}

impl RedisKeyValueStore {
    /// Connect to the Redis server at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or the initial
    /// connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, RedisCacheError> {
        let client =
            redis::Client::open(url).map_err(|e| RedisCacheError::InvalidUrl(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| RedisCacheError::Connection(e.to_string()))?;

        Ok(Self {
            conn,
            scan_count: DEFAULT_SCAN_COUNT,
        })
    }

    /// Set the number of keys requested per `SCAN` page.
    pub fn with_scan_count(mut self, count: usize) -> Self {
        self.scan_count = count.max(1);
        self
    }

    /// Round-trip a `PING` to check connectivity.
    pub async fn ping(&self) -> Result<(), RedisCacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Walk the keyspace with `SCAN MATCH`, stopping early once `limit` keys
    /// have been collected.
    async fn scan(&self, pattern: &str, limit: Option<usize>) -> Result<Vec<String>, RedisCacheError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut conn)
                .await?;

            found.extend(keys);
            if let Some(limit) = limit {
                if found.len() >= limit {
                    found.truncate(limit);
                    return Ok(found);
                }
            }

            if next == 0 {
                return Ok(found);
            }
            cursor = next;
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> CatalogResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.map_err(RedisCacheError::from)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> CatalogResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        match expiry {
            Expiry::After(ttl) => {
                // PX rejects zero; keep at least one millisecond.
                let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                cmd.arg("PX").arg(millis);
            }
            Expiry::KeepExisting => {
                cmd.arg("KEEPTTL");
            }
        }

        let _: () = cmd
            .query_async(&mut conn)
            .await
            .map_err(RedisCacheError::from)?;
        Ok(())
    }

    async fn find_first(&self, pattern: &str) -> CatalogResult<Option<String>> {
        Ok(self.scan(pattern, Some(1)).await?.into_iter().next())
    }

    async fn scan_match(&self, pattern: &str) -> CatalogResult<Vec<String>> {
        Ok(self.scan(pattern, None).await?)
    }

    async fn flush(&self) -> CatalogResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(RedisCacheError::from)?;
        Ok(())
    }
}
