//! Catalog Test Utilities
//!
//! Shared test infrastructure for the catalog workspace:
//! - Item fixtures
//! - Proptest generators for items and windows
//! - Recording and failing doubles for the cache, the analytics store and
//!   the batch sender

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use catalog_events::{AnalyticsExecutor, AnalyticsValue, BatchSender, COLUMNS_PER_ROW};
use catalog_storage::{Expiry, KeyValueStore};
use chrono::{TimeZone, Utc};

// Re-export core types for convenience
pub use catalog_core::{
    AnalyticsError, AnalyticsEvent, CacheError, CatalogError, CatalogResult, Item, ItemId,
    NullableText, ProjectId, Timestamp, Window,
};
pub use catalog_storage::{InMemoryItemStore, InMemoryKeyValueStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Deterministic items for example-based tests.

    use super::*;

    /// Fixed creation time shared by every fixture.
    pub fn created_at() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// An item whose priority equals its id.
    pub fn item(id: ItemId, project_id: ProjectId) -> Item {
        Item {
            id,
            project_id,
            name: format!("item-{id}"),
            description: NullableText::null(),
            priority: id,
            removed: false,
            created_at: created_at(),
        }
    }

    /// Items `1..=count` of one project, already in listing order.
    pub fn items(project_id: ProjectId, count: i32) -> Vec<Item> {
        (1..=count).map(|id| item(id, project_id)).collect()
    }

    /// A store of record seeded with [`items`].
    pub fn seeded_store(project_id: ProjectId, count: i32) -> InMemoryItemStore {
        InMemoryItemStore::with_items(items(project_id, count))
    }

    /// A change event for [`item`] captured one minute after creation.
    pub fn event(id: ItemId, project_id: ProjectId) -> AnalyticsEvent {
        AnalyticsEvent::captured_at(item(id, project_id), created_at() + chrono::Duration::minutes(1))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for catalog types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a Timestamp (DateTime<Utc>) between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate a nullable description.
    pub fn arb_description() -> impl Strategy<Value = NullableText> {
        prop::option::of("[a-zA-Z0-9 ]{0,40}").prop_map(NullableText::from)
    }

    /// Generate an Item.
    pub fn arb_item() -> impl Strategy<Value = Item> {
        (
            1i32..10_000,
            1i32..100,
            "[a-zA-Z0-9_]{1,30}",
            arb_description(),
            0i32..1_000,
            any::<bool>(),
            arb_timestamp(),
        )
            .prop_map(
                |(id, project_id, name, description, priority, removed, created_at)| Item {
                    id,
                    project_id,
                    name,
                    description,
                    priority,
                    removed,
                    created_at,
                },
            )
    }

    /// Generate a listing window with a positive limit.
    pub fn arb_window() -> impl Strategy<Value = Window> {
        (1i64..20, 0i64..50).prop_map(|(limit, offset)| Window::new(limit, offset))
    }

    /// Generate a project's items with distinct ids and ascending priorities.
    pub fn arb_project_items(project_id: ProjectId) -> impl Strategy<Value = Vec<Item>> {
        (0usize..40).prop_map(move |count| {
            (1..=count as i32)
                .map(|id| super::fixtures::item(id, project_id))
                .collect()
        })
    }
}

// ============================================================================
// ANALYTICS DOUBLES
// ============================================================================

/// [`AnalyticsExecutor`] that records every statement. Optionally fails.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<(String, Vec<AnalyticsValue>)>>,
    fail: bool,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor whose every call fails after being recorded.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Statements executed so far, with their parameters.
    pub fn statements(&self) -> Vec<(String, Vec<AnalyticsValue>)> {
        lock(&self.statements).clone()
    }

    /// Row count of each executed statement.
    pub fn rows_per_statement(&self) -> Vec<usize> {
        lock(&self.statements)
            .iter()
            .map(|(_, params)| params.len() / COLUMNS_PER_ROW)
            .collect()
    }
}

#[async_trait]
impl AnalyticsExecutor for RecordingExecutor {
    async fn execute(&self, statement: &str, params: &[AnalyticsValue]) -> CatalogResult<u64> {
        lock(&self.statements).push((statement.to_string(), params.to_vec()));
        let rows = params.len() / COLUMNS_PER_ROW;
        if self.fail {
            return Err(AnalyticsError::ExecuteFailed {
                rows,
                reason: "analytics store rejected the batch".to_string(),
            }
            .into());
        }
        Ok(rows as u64)
    }
}

/// [`BatchSender`] that keeps every batch it was handed.
#[derive(Debug, Default)]
pub struct RecordingSender {
    batches: Mutex<Vec<Vec<AnalyticsEvent>>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<AnalyticsEvent>> {
        lock(&self.batches).clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        lock(&self.batches).iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl BatchSender for RecordingSender {
    async fn send(&self, batch: &[AnalyticsEvent]) -> CatalogResult<()> {
        lock(&self.batches).push(batch.to_vec());
        Ok(())
    }
}

// ============================================================================
// CACHE DOUBLES
// ============================================================================

/// [`KeyValueStore`] whose backend is unreachable.
#[derive(Debug, Default, Clone)]
pub struct FailingKeyValueStore;

fn unavailable() -> CatalogError {
    CacheError::Unavailable {
        reason: "connection refused".to_string(),
    }
    .into()
}

#[async_trait]
impl KeyValueStore for FailingKeyValueStore {
    async fn get(&self, _key: &str) -> CatalogResult<Option<String>> {
        Err(unavailable())
    }

    async fn set(&self, _key: &str, _value: &str, _expiry: Expiry) -> CatalogResult<()> {
        Err(unavailable())
    }

    async fn scan_match(&self, _pattern: &str) -> CatalogResult<Vec<String>> {
        Err(unavailable())
    }

    async fn flush(&self) -> CatalogResult<()> {
        Err(unavailable())
    }
}

/// Shared handle to a fresh in-memory cache backend.
pub fn memory_kv() -> Arc<InMemoryKeyValueStore> {
    Arc::new(InMemoryKeyValueStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_storage::PositionCache;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_failing_store_reports_unavailable() {
        let err = FailingKeyValueStore.get("1:1:1").await.unwrap_err();
        assert!(matches!(err, CatalogError::Cache(CacheError::Unavailable { .. })));
    }

    proptest! {
        #[test]
        fn prop_window_covers_exactly_limit_ranks(window in generators::arb_window()) {
            prop_assert_eq!(window.ranks().count() as i64, window.limit);
            prop_assert_eq!(window.first_rank(), window.offset + 1);
        }

        #[test]
        fn prop_inserted_item_is_found_at_its_rank(item in generators::arb_item(), rank in 1i64..50) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let probe = runtime.block_on(async {
                let cache = PositionCache::new(memory_kv());
                cache.insert(&item, rank, Expiry::KeepExisting).await.unwrap();
                cache.probe(Window::new(3, rank - 1)).await.unwrap()
            });

            prop_assert_eq!(probe.hits, vec![item]);
            prop_assert_eq!(probe.hit_ranks, vec![rank]);
            prop_assert_eq!(probe.misses, vec![rank + 1, rank + 2]);
        }

        #[test]
        fn prop_project_items_are_in_listing_order(items in generators::arb_project_items(3)) {
            prop_assert!(items.windows(2).all(|w| (w[0].priority, w[0].id) < (w[1].priority, w[1].id)));
            prop_assert!(items.iter().all(|i| i.project_id == 3));
        }
    }
}
