//! Key-value backend trait for the position cache.
//!
//! The position cache only needs string keys, string values, a TTL policy
//! on writes, and a pattern lookup for wildcard keys. Backends expose the
//! store-native pattern scan so callers never iterate cursors themselves.

use std::time::Duration;

use async_trait::async_trait;
use catalog_core::CatalogResult;

/// Expiration policy applied on a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Entry expires after the given duration.
    After(Duration),
    /// Keep whatever expiration the existing entry already has.
    KeepExisting,
}

/// Key-value backend trait for pluggable cache implementations.
///
/// Patterns use `*` as the only wildcard, matching any run of characters.
/// Implementations should be thread-safe and support concurrent access.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the raw value under `key`, or None if absent or expired.
    async fn get(&self, key: &str) -> CatalogResult<Option<String>>;

    /// Write `value` under `key` with the given expiration policy.
    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> CatalogResult<()>;

    /// Return the first key matching `pattern`, if any.
    async fn find_first(&self, pattern: &str) -> CatalogResult<Option<String>> {
        Ok(self.scan_match(pattern).await?.into_iter().next())
    }

    /// Return every key matching `pattern`.
    async fn scan_match(&self, pattern: &str) -> CatalogResult<Vec<String>>;

    /// Drop every entry in the store.
    async fn flush(&self) -> CatalogResult<()>;
}

/// Statistics about position cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Ranks served from the cache.
    pub hits: u64,
    /// Ranks that had to be read from the store of record.
    pub misses: u64,
    /// Entries whose value could not be decoded.
    pub decode_failures: u64,
    /// Entries written at a fresh position.
    pub inserts: u64,
    /// Existing entries rewritten after a mutation.
    pub overwrites: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
