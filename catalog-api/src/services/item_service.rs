//! Item Service
//!
//! Coordinates the store of record, the position cache and the change-event
//! publisher for every item operation.
//!
//! The store of record is authoritative. Once a store write has succeeded,
//! refreshing the cache and publishing the change event are best effort:
//! failures are logged and the request still succeeds.

use std::sync::Arc;
use std::time::Duration;

use catalog_core::{
    CatalogResult, Item, ItemId, ListMeta, ListingPage, NullableText, ProjectId, StoreError,
    Window,
};
use catalog_events::EventPublisher;
use catalog_storage::{
    reconcile, Expiry, ItemStore, KeyValueStore, Position, PositionCache, ProbeResult, PutMode,
    Reconciliation,
};
use tracing::{debug, warn};

/// Business logic behind the item endpoints.
pub struct ItemService {
    store: Arc<dyn ItemStore>,
    cache: Arc<PositionCache<dyn KeyValueStore>>,
    publisher: EventPublisher,
    ttl: Duration,
}

impl ItemService {
    /// # Arguments
    /// - `store`: Store of record
    /// - `cache`: Position cache used for listings
    /// - `publisher`: Publisher for item change events
    /// - `ttl`: Expiration of entries written back after a store read
    pub fn new(
        store: Arc<dyn ItemStore>,
        cache: Arc<PositionCache<dyn KeyValueStore>>,
        publisher: EventPublisher,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            ttl,
        }
    }

    pub fn cache(&self) -> &PositionCache<dyn KeyValueStore> {
        &self.cache
    }

    // ========================================================================
    // LISTING
    // ========================================================================

    /// List a window of items, serving what it can from the cache.
    ///
    /// A fully cached window never reaches the store of record and reports
    /// zero totals. Otherwise the smallest range covering every miss is read
    /// in one transaction, spliced into the hits and written back.
    pub async fn list(&self, window: Window) -> CatalogResult<ListingPage> {
        let probe = match self.cache.probe(window).await {
            Ok(probe) => probe,
            Err(e) => {
                warn!(error = %e, "Cache probe failed, reading window from store");
                ProbeResult::all_missed(window)
            }
        };

        let plan = match reconcile(window, probe) {
            Reconciliation::Complete(items) => {
                debug!(limit = window.limit, offset = window.offset, "Listing served from cache");
                return Ok(ListingPage {
                    meta: ListMeta {
                        total: 0,
                        removed: 0,
                        limit: window.limit,
                        offset: window.offset,
                    },
                    items,
                });
            }
            Reconciliation::Gap(plan) => plan,
        };

        let gap = plan.gap;
        let read = self.store.read_window(gap).await?;
        let fetched = read.items;

        self.write_back(gap, &fetched).await;

        Ok(ListingPage {
            meta: ListMeta {
                total: read.total,
                removed: read.removed,
                limit: gap.limit,
                offset: gap.offset,
            },
            items: plan.merge(fetched),
        })
    }

    async fn write_back(&self, gap: Window, fetched: &[Item]) {
        let expiry = Expiry::After(self.ttl);
        for (i, item) in fetched.iter().enumerate() {
            let rank = gap.offset + i as i64 + 1;
            if let Err(e) = self
                .cache
                .put(item, Position::Rank(rank), expiry, PutMode::Insert)
                .await
            {
                warn!(item_id = item.id, project_id = item.project_id, rank, error = %e, "Failed to cache item");
            }
        }
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Create an item at the bottom of the project's priority order.
    pub async fn create(&self, project_id: ProjectId, name: &str) -> CatalogResult<Item> {
        let item = self.store.create(project_id, name).await?;
        tracing::info!(item_id = item.id, project_id, "Item created");
        self.publish(&item).await;
        Ok(item)
    }

    /// Rename an item and replace its description.
    pub async fn update(
        &self,
        id: ItemId,
        project_id: ProjectId,
        name: &str,
        description: NullableText,
    ) -> CatalogResult<Item> {
        self.ensure_exists(id, project_id).await?;
        let item = self.store.update(id, project_id, name, description).await?;
        tracing::info!(item_id = id, project_id, "Item updated");
        self.propagate(&item).await;
        Ok(item)
    }

    /// Flag an item as removed.
    pub async fn remove(&self, id: ItemId, project_id: ProjectId) -> CatalogResult<Item> {
        self.ensure_exists(id, project_id).await?;
        let item = self.store.remove(id, project_id).await?;
        tracing::info!(item_id = id, project_id, "Item removed");
        self.propagate(&item).await;
        Ok(item)
    }

    /// Move an item to `new_priority`, shifting the items it displaces.
    ///
    /// Returns every affected row, the moved item first.
    pub async fn reprioritize(
        &self,
        id: ItemId,
        project_id: ProjectId,
        new_priority: i32,
    ) -> CatalogResult<Vec<Item>> {
        self.ensure_exists(id, project_id).await?;
        let affected = self.store.reprioritize(id, project_id, new_priority).await?;
        tracing::info!(
            item_id = id,
            project_id,
            new_priority,
            affected = affected.len(),
            "Item reprioritized"
        );
        for item in &affected {
            self.propagate(item).await;
        }
        Ok(affected)
    }

    async fn ensure_exists(&self, id: ItemId, project_id: ProjectId) -> CatalogResult<()> {
        if self.store.exists(id, project_id).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                item_id: id,
                project_id,
            }
            .into())
        }
    }

    /// Refresh every cached copy of `item` and publish its change event.
    async fn propagate(&self, item: &Item) {
        if let Err(e) = self
            .cache
            .put(item, Position::Any, Expiry::KeepExisting, PutMode::OverwriteExisting)
            .await
        {
            warn!(item_id = item.id, project_id = item.project_id, error = %e, "Failed to update cache");
        }
        self.publish(item).await;
    }

    async fn publish(&self, item: &Item) {
        if let Err(e) = self.publisher.publish(item).await {
            warn!(
                item_id = item.id,
                project_id = item.project_id,
                subject = %self.publisher.subject(),
                error = %e,
                "Failed to publish change event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::{CatalogError, Timestamp};
    use catalog_events::{EventBus, InMemoryEventBus};
    use catalog_storage::{InMemoryItemStore, InMemoryKeyValueStore};
    use chrono::{TimeZone, Utc};

    fn created_at() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn item(id: ItemId, project_id: ProjectId, priority: i32) -> Item {
        Item {
            id,
            project_id,
            name: format!("item-{id}"),
            description: NullableText::null(),
            priority,
            removed: false,
            created_at: created_at(),
        }
    }

    struct Fixture {
        store: Arc<InMemoryItemStore>,
        kv: Arc<InMemoryKeyValueStore>,
        bus: Arc<InMemoryEventBus>,
        service: ItemService,
    }

    fn fixture(items: Vec<Item>) -> Fixture {
        let store = Arc::new(InMemoryItemStore::with_items(items));
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let bus = Arc::new(InMemoryEventBus::default());
        let kv_dyn: Arc<dyn KeyValueStore> = kv.clone();
        let service = ItemService::new(
            store.clone(),
            Arc::new(PositionCache::new(kv_dyn)),
            EventPublisher::new(bus.clone(), "logs.item"),
            Duration::from_secs(60),
        );
        Fixture {
            store,
            kv,
            bus,
            service,
        }
    }

    fn ids(items: &[Item]) -> Vec<ItemId> {
        items.iter().map(|i| i.id).collect()
    }

    #[tokio::test]
    async fn test_cold_listing_reads_store_and_writes_back() -> CatalogResult<()> {
        let f = fixture((1..=6).map(|id| item(id, 1, id)).collect());

        let page = f.service.list(Window::new(3, 1)).await?;
        assert_eq!(ids(&page.items), vec![2, 3, 4]);
        assert_eq!(page.meta.total, 6);
        assert_eq!((page.meta.limit, page.meta.offset), (3, 1));
        assert_eq!(f.store.window_reads(), 1);
        assert_eq!(f.kv.len(), 3);
        assert!(f.kv.ttl("2:1:2").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_warm_listing_skips_store() -> CatalogResult<()> {
        let f = fixture((1..=6).map(|id| item(id, 1, id)).collect());
        f.service.list(Window::new(3, 1)).await?;

        let page = f.service.list(Window::new(3, 1)).await?;
        assert_eq!(ids(&page.items), vec![2, 3, 4]);
        assert_eq!((page.meta.total, page.meta.removed), (0, 0));
        assert_eq!(f.store.window_reads(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_hits_fetch_only_the_gap() -> CatalogResult<()> {
        let f = fixture((1..=6).map(|id| item(id, 1, id)).collect());
        f.service.list(Window::new(2, 2)).await?;

        let page = f.service.list(Window::new(4, 0)).await?;
        assert_eq!(ids(&page.items), vec![1, 2, 3, 4]);
        assert_eq!((page.meta.limit, page.meta.offset), (2, 0));
        assert_eq!(f.store.window_reads(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_refreshes_cached_copies() -> CatalogResult<()> {
        let f = fixture(vec![item(1, 2, 1), item(2, 2, 2)]);
        f.service.list(Window::new(2, 0)).await?;

        let updated = f
            .service
            .update(1, 2, "renamed", NullableText::new("fresh"))
            .await?;
        assert_eq!(updated.name, "renamed");

        let page = f.service.list(Window::new(2, 0)).await?;
        assert_eq!(page.items[0].name, "renamed");
        assert_eq!(page.items[0].description.as_deref(), Some("fresh"));
        assert_eq!(f.store.window_reads(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_mutations_publish_events() -> CatalogResult<()> {
        let f = fixture(vec![item(1, 2, 1), item(2, 2, 2)]);
        let mut sub = f.bus.subscribe("logs.item", 16).await?;

        f.service.remove(1, 2).await?;
        let message = sub.recv().await.expect("event published");
        let event = catalog_events::decode_event(&message.subject, &message.payload)?;
        assert_eq!(event.item.id, 1);
        assert!(event.item.removed);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_item_is_not_found() {
        let f = fixture(vec![item(1, 2, 1)]);
        let err = f.service.remove(1, 3).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Store(StoreError::NotFound { item_id: 1, project_id: 3 })
        ));
    }

    #[tokio::test]
    async fn test_reprioritize_refreshes_each_affected_row() -> CatalogResult<()> {
        let f = fixture(vec![item(1, 2, 1), item(2, 2, 2), item(3, 2, 3)]);
        f.service.list(Window::new(3, 0)).await?;

        let affected = f.service.reprioritize(3, 2, 1).await?;
        assert_eq!(affected[0].id, 3);
        assert_eq!(affected.len(), 3);

        let page = f.service.list(Window::new(3, 0)).await?;
        let priorities: Vec<_> = page.items.iter().map(|i| (i.id, i.priority)).collect();
        assert_eq!(priorities, vec![(1, 2), (2, 3), (3, 1)]);
        Ok(())
    }
}
