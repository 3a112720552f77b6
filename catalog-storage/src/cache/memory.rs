//! In-process key-value backend.
//!
//! Keeps entries in an ordered map so pattern scans return keys in a stable
//! order. Expired entries are treated as absent on read and swept out every
//! [`PURGE_INTERVAL`] writes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use catalog_core::{CacheError, CatalogResult};
use regex::Regex;

use super::traits::{Expiry, KeyValueStore};

/// Writes between sweeps of expired entries.
pub const PURGE_INTERVAL: u64 = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-memory [`KeyValueStore`] used for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, Entry>>,
    writes: AtomicU64,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time to live for `key`, None if absent or persistent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.read().ok()?;
        let now = Instant::now();
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> CatalogResult<usize> {
        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(before - entries.len())
    }
}

/// Translate a `*` glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> CatalogResult<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", body)).map_err(|e| {
        CacheError::InvalidKey {
            key: pattern.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> CatalogResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| CacheError::LockPoisoned)?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> CatalogResult<()> {
        {
            let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
            let now = Instant::now();

            let expires_at = match expiry {
                Expiry::After(ttl) => Some(now + ttl),
                Expiry::KeepExisting => entries
                    .get(key)
                    .filter(|entry| entry.is_live(now))
                    .and_then(|entry| entry.expires_at),
            };

            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at,
                },
            );
        }

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % PURGE_INTERVAL == 0 {
            self.purge_expired()?;
        }
        Ok(())
    }

    async fn find_first(&self, pattern: &str) -> CatalogResult<Option<String>> {
        let matcher = glob_to_regex(pattern)?;
        let entries = self.entries.read().map_err(|_| CacheError::LockPoisoned)?;
        let now = Instant::now();
        Ok(entries
            .iter()
            .find(|(key, entry)| entry.is_live(now) && matcher.is_match(key))
            .map(|(key, _)| key.clone()))
    }

    async fn scan_match(&self, pattern: &str) -> CatalogResult<Vec<String>> {
        let matcher = glob_to_regex(pattern)?;
        let entries = self.entries.read().map_err(|_| CacheError::LockPoisoned)?;
        let now = Instant::now();
        Ok(entries
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && matcher.is_match(key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn flush(&self) -> CatalogResult<()> {
        self.entries
            .write()
            .map_err(|_| CacheError::LockPoisoned)?
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() -> CatalogResult<()> {
        let store = InMemoryKeyValueStore::new();
        store.set("1:2:3", "value", Expiry::After(Duration::from_secs(60))).await?;
        assert_eq!(store.get("1:2:3").await?, Some("value".to_string()));
        assert_eq!(store.get("1:2:4").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent() -> CatalogResult<()> {
        let store = InMemoryKeyValueStore::new();
        store.set("k", "v", Expiry::After(Duration::ZERO)).await?;
        assert_eq!(store.get("k").await?, None);
        assert_eq!(store.find_first("k").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_keep_existing_preserves_ttl() -> CatalogResult<()> {
        let store = InMemoryKeyValueStore::new();
        store.set("k", "v1", Expiry::After(Duration::from_secs(60))).await?;
        store.set("k", "v2", Expiry::KeepExisting).await?;

        assert_eq!(store.get("k").await?, Some("v2".to_string()));
        let ttl = store.ttl("k").expect("ttl kept");
        assert!(ttl <= Duration::from_secs(60));
        assert!(ttl > Duration::from_secs(50));
        Ok(())
    }

    #[tokio::test]
    async fn test_keep_existing_on_new_key_is_persistent() -> CatalogResult<()> {
        let store = InMemoryKeyValueStore::new();
        store.set("k", "v", Expiry::KeepExisting).await?;
        assert_eq!(store.get("k").await?, Some("v".to_string()));
        assert_eq!(store.ttl("k"), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_pattern_matching_is_anchored() -> CatalogResult<()> {
        let store = InMemoryKeyValueStore::new();
        let ttl = Expiry::After(Duration::from_secs(60));
        store.set("1:2:11", "a", ttl).await?;
        store.set("3:2:1", "b", ttl).await?;
        store.set("1:2:5", "c", ttl).await?;

        assert_eq!(store.find_first("*:*:1").await?, Some("3:2:1".to_string()));
        assert_eq!(
            store.scan_match("1:2:*").await?,
            vec!["1:2:11".to_string(), "1:2:5".to_string()]
        );
        assert!(store.scan_match("9:*:*").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_pattern_escapes_regex_metacharacters() -> CatalogResult<()> {
        let store = InMemoryKeyValueStore::new();
        store.set("a.b", "v", Expiry::KeepExisting).await?;
        assert_eq!(store.find_first("a?b").await?, None);
        assert_eq!(store.find_first("a.*").await?, Some("a.b".to_string()));
        assert_eq!(store.find_first("axb").await?, None);
        Ok(())
    }

    fn stored(store: &InMemoryKeyValueStore) -> usize {
        store.entries.read().unwrap().len()
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept_periodically() -> CatalogResult<()> {
        let store = InMemoryKeyValueStore::new();
        store.set("stale", "v", Expiry::After(Duration::ZERO)).await?;
        store.set("fresh", "v", Expiry::KeepExisting).await?;
        assert_eq!(stored(&store), 2);
        assert_eq!(store.len(), 1);

        for n in 2..PURGE_INTERVAL {
            store.set("fresh", &n.to_string(), Expiry::KeepExisting).await?;
        }
        assert_eq!(stored(&store), 1);
        assert_eq!(store.get("fresh").await?, Some((PURGE_INTERVAL - 1).to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_purge_expired_reports_removed() -> CatalogResult<()> {
        let store = InMemoryKeyValueStore::new();
        store.set("a", "1", Expiry::After(Duration::ZERO)).await?;
        store.set("b", "2", Expiry::After(Duration::ZERO)).await?;
        store.set("c", "3", Expiry::After(Duration::from_secs(60))).await?;

        assert_eq!(store.purge_expired()?, 2);
        assert_eq!(store.purge_expired()?, 0);
        assert_eq!(stored(&store), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_keep_existing_over_expired_entry_is_persistent() -> CatalogResult<()> {
        let store = InMemoryKeyValueStore::new();
        store.set("k", "old", Expiry::After(Duration::ZERO)).await?;
        store.set("k", "new", Expiry::KeepExisting).await?;
        assert_eq!(store.get("k").await?, Some("new".to_string()));
        assert_eq!(store.ttl("k"), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_flush_clears_everything() -> CatalogResult<()> {
        let store = InMemoryKeyValueStore::new();
        store.set("a", "1", Expiry::KeepExisting).await?;
        store.set("b", "2", Expiry::KeepExisting).await?;
        store.flush().await?;
        assert!(store.is_empty());
        Ok(())
    }
}
