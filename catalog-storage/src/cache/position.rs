//! Position-indexed item cache.
//!
//! Listings are cached one rank at a time: the snapshot of the item that
//! occupied rank `r` is stored under `"{id}:{project_id}:{r}"`. A probe walks
//! the requested ranks in ascending order, so hits come back already sorted.
//!
//! Mutations rewrite every positional entry of the mutated item, because the
//! same item may sit in several cached windows. Those scan-and-rewrite writes
//! are serialized per `(item_id, project_id)` so two concurrent mutations of
//! one item cannot interleave their scan and write phases.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use catalog_core::{CacheError, CatalogResult, Item, ItemId, ProjectId, Window};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::key::{CacheKey, Position};
use super::traits::{CacheStats, Expiry, KeyValueStore};

/// How [`PositionCache::put`] treats existing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Write a new entry at the given position unconditionally.
    Insert,
    /// Rewrite every existing entry of the item in place; no-op if none.
    OverwriteExisting,
}

/// Outcome of probing a window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    /// Cached items in ascending rank order.
    pub hits: Vec<Item>,
    /// Rank of each entry in `hits`.
    pub hit_ranks: Vec<i64>,
    /// Ranks without a usable cache entry, ascending.
    pub misses: Vec<i64>,
}

impl ProbeResult {
    /// A probe where every rank of `window` missed.
    pub fn all_missed(window: Window) -> Self {
        Self {
            misses: window.ranks().collect(),
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.misses.is_empty()
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    decode_failures: AtomicU64,
    inserts: AtomicU64,
    overwrites: AtomicU64,
}

/// Position-indexed cache over a [`KeyValueStore`].
pub struct PositionCache<K: KeyValueStore + ?Sized> {
    store: Arc<K>,
    write_locks: DashMap<(ItemId, ProjectId), Arc<Mutex<()>>>,
    counters: Counters,
}

impl<K: KeyValueStore + ?Sized> PositionCache<K> {
    pub fn new(store: Arc<K>) -> Self {
        Self {
            store,
            write_locks: DashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Get a reference to the key-value backend.
    pub fn backend(&self) -> &K {
        &self.store
    }

    /// Look up every rank of `window` in ascending order.
    ///
    /// An entry that cannot be decoded counts as a miss. Backend errors are
    /// returned to the caller, who is expected to fall back to the store of
    /// record.
    pub async fn probe(&self, window: Window) -> CatalogResult<ProbeResult> {
        let mut result = ProbeResult::default();

        for rank in window.ranks() {
            match self.lookup_rank(rank).await? {
                Some(item) => {
                    result.hits.push(item);
                    result.hit_ranks.push(rank);
                }
                None => result.misses.push(rank),
            }
        }

        self.counters
            .hits
            .fetch_add(result.hits.len() as u64, Ordering::Relaxed);
        self.counters
            .misses
            .fetch_add(result.misses.len() as u64, Ordering::Relaxed);

        debug!(
            limit = window.limit,
            offset = window.offset,
            hits = result.hits.len(),
            misses = result.misses.len(),
            "Probed position cache"
        );
        Ok(result)
    }

    async fn lookup_rank(&self, rank: i64) -> CatalogResult<Option<Item>> {
        let Some(key) = self.store.find_first(&CacheKey::rank_pattern(rank)).await? else {
            return Ok(None);
        };

        // The entry may have expired between the scan and the read.
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<Item>(&raw) {
            Ok(item) => Ok(Some(item)),
            Err(e) => {
                self.counters.decode_failures.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, rank, error = %e, "Undecodable cache entry treated as miss");
                Ok(None)
            }
        }
    }

    /// Write an item snapshot.
    ///
    /// - [`PutMode::Insert`] writes `item` at `position`, which must be a
    ///   concrete rank.
    /// - [`PutMode::OverwriteExisting`] ignores `position` and rewrites every
    ///   entry already cached for the item.
    ///
    /// Returns the number of entries written.
    pub async fn put(
        &self,
        item: &Item,
        position: Position,
        expiry: Expiry,
        mode: PutMode,
    ) -> CatalogResult<usize> {
        match (mode, position) {
            (PutMode::Insert, Position::Rank(rank)) => {
                self.insert(item, rank, expiry).await?;
                Ok(1)
            }
            (PutMode::Insert, Position::Any) => Err(CacheError::InvalidKey {
                key: CacheKey::item_pattern(item.id, item.project_id),
                reason: "wildcard position cannot be written".to_string(),
            }
            .into()),
            (PutMode::OverwriteExisting, _) => self.overwrite(item, expiry).await,
        }
    }

    /// Write `item` at `rank` unconditionally.
    pub async fn insert(&self, item: &Item, rank: i64, expiry: Expiry) -> CatalogResult<()> {
        let key = CacheKey::at_rank(item.id, item.project_id, rank).to_string();
        let value = encode(&key, item)?;
        self.store.set(&key, &value, expiry).await?;
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, item_id = item.id, project_id = item.project_id, "Cached item");
        Ok(())
    }

    /// Rewrite every cached position of `item`; no-op when none exist.
    pub async fn overwrite(&self, item: &Item, expiry: Expiry) -> CatalogResult<usize> {
        let pair = item.key();
        let lock = self
            .write_locks
            .entry(pair)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let written = {
            let _guard = lock.lock().await;
            self.overwrite_locked(item, expiry).await
        };

        drop(lock);
        self.write_locks
            .remove_if(&pair, |_, lock| Arc::strong_count(lock) == 1);

        written
    }

    async fn overwrite_locked(&self, item: &Item, expiry: Expiry) -> CatalogResult<usize> {
        let pattern = CacheKey::item_pattern(item.id, item.project_id);
        let keys = self.store.scan_match(&pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let value = encode(&pattern, item)?;
        for key in &keys {
            self.store.set(key, &value, expiry).await?;
        }

        self.counters
            .overwrites
            .fetch_add(keys.len() as u64, Ordering::Relaxed);
        debug!(
            item_id = item.id,
            project_id = item.project_id,
            entries = keys.len(),
            "Updated cached item"
        );
        Ok(keys.len())
    }

    /// Drop every cached entry.
    pub async fn clear(&self) -> CatalogResult<()> {
        self.store.flush().await
    }

    /// Snapshot of usage counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            decode_failures: self.counters.decode_failures.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            overwrites: self.counters.overwrites.load(Ordering::Relaxed),
        }
    }
}

fn encode(key: &str, item: &Item) -> Result<String, CacheError> {
    serde_json::to_string(item).map_err(|e| CacheError::Encode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
