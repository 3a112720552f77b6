//! Store-of-record abstraction.
//!
//! The relational store owns every item. Listings read a window of the
//! priority-ordered item table together with aggregate counters; mutations
//! return the rows they touched so callers can refresh the cache and emit
//! change events.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use catalog_core::{
    CatalogResult, Item, ItemId, NullableText, ProjectId, StoreError, Timestamp, Window,
};
use chrono::Utc;

/// Result of a windowed read: the rows of the window plus table-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowRead {
    /// Rows ordered by `(priority, id)`.
    pub items: Vec<Item>,
    /// Number of items in the table.
    pub total: i64,
    /// Number of items flagged as removed.
    pub removed: i64,
}

/// Async access to the store of record.
///
/// Implementations must run [`ItemStore::read_window`] inside a single
/// repeatable-read snapshot so the counters and the rows agree.
#[async_trait]
pub trait ItemStore: Send + Sync {
    // ========================================================================
    // READS
    // ========================================================================

    /// Read `window` (ordered by priority, then id) and the aggregate counts.
    async fn read_window(&self, window: Window) -> CatalogResult<WindowRead>;

    /// Whether the item exists in the given project.
    async fn exists(&self, id: ItemId, project_id: ProjectId) -> CatalogResult<bool>;

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Create an item at the bottom of the project's priority order.
    async fn create(&self, project_id: ProjectId, name: &str) -> CatalogResult<Item>;

    /// Replace the name and description of an item.
    async fn update(
        &self,
        id: ItemId,
        project_id: ProjectId,
        name: &str,
        description: NullableText,
    ) -> CatalogResult<Item>;

    /// Flag an item as removed. The row is kept.
    async fn remove(&self, id: ItemId, project_id: ProjectId) -> CatalogResult<Item>;

    /// Move an item to `new_priority`, pushing every other item of the
    /// project at or below that priority down by one. Returns every row whose
    /// priority changed, the moved item first.
    async fn reprioritize(
        &self,
        id: ItemId,
        project_id: ProjectId,
        new_priority: i32,
    ) -> CatalogResult<Vec<Item>>;
}

// ============================================================================
// IN-MEMORY IMPLEMENTATION
// ============================================================================

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<(ProjectId, ItemId), Item>,
    next_id: ItemId,
}

impl Table {
    fn get_mut(&mut self, id: ItemId, project_id: ProjectId) -> CatalogResult<&mut Item> {
        self.rows.get_mut(&(project_id, id)).ok_or_else(|| {
            StoreError::NotFound {
                item_id: id,
                project_id,
            }
            .into()
        })
    }
}

/// In-memory [`ItemStore`] for tests and local runs.
///
/// Counts window reads so callers can assert that a fully cached listing
/// never touched the store.
#[derive(Debug, Default)]
pub struct InMemoryItemStore {
    table: RwLock<Table>,
    window_reads: AtomicU64,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing rows. Ids are kept as given.
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new();
        if let Ok(mut table) = store.table.write() {
            for item in items {
                table.next_id = table.next_id.max(item.id);
                table.rows.insert((item.project_id, item.id), item);
            }
        }
        store
    }

    /// Number of [`ItemStore::read_window`] calls served so far.
    pub fn window_reads(&self) -> u64 {
        self.window_reads.load(Ordering::Relaxed)
    }

    /// Snapshot of a single row.
    pub fn get(&self, id: ItemId, project_id: ProjectId) -> Option<Item> {
        self.table
            .read()
            .ok()
            .and_then(|table| table.rows.get(&(project_id, id)).cloned())
    }

    fn now() -> Timestamp {
        Utc::now()
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn read_window(&self, window: Window) -> CatalogResult<WindowRead> {
        self.window_reads.fetch_add(1, Ordering::Relaxed);
        let table = self.table.read().map_err(|_| StoreError::LockPoisoned)?;

        let mut ordered: Vec<&Item> = table.rows.values().collect();
        ordered.sort_by_key(|item| (item.priority, item.id));

        let skip = usize::try_from(window.offset).unwrap_or(0);
        let take = usize::try_from(window.limit).unwrap_or(0);

        Ok(WindowRead {
            items: ordered.iter().skip(skip).take(take).map(|&i| i.clone()).collect(),
            total: ordered.len() as i64,
            removed: ordered.iter().filter(|item| item.removed).count() as i64,
        })
    }

    async fn exists(&self, id: ItemId, project_id: ProjectId) -> CatalogResult<bool> {
        let table = self.table.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(table.rows.contains_key(&(project_id, id)))
    }

    async fn create(&self, project_id: ProjectId, name: &str) -> CatalogResult<Item> {
        let mut table = self.table.write().map_err(|_| StoreError::LockPoisoned)?;

        let priority = table
            .rows
            .values()
            .filter(|item| item.project_id == project_id)
            .map(|item| item.priority)
            .max()
            .map_or(1, |max| max + 1);

        table.next_id += 1;
        let item = Item {
            id: table.next_id,
            project_id,
            name: name.to_string(),
            description: NullableText::null(),
            priority,
            removed: false,
            created_at: Self::now(),
        };
        table.rows.insert((project_id, item.id), item.clone());
        Ok(item)
    }

    async fn update(
        &self,
        id: ItemId,
        project_id: ProjectId,
        name: &str,
        description: NullableText,
    ) -> CatalogResult<Item> {
        let mut table = self.table.write().map_err(|_| StoreError::LockPoisoned)?;
        let item = table.get_mut(id, project_id)?;
        item.name = name.to_string();
        item.description = description;
        Ok(item.clone())
    }

    async fn remove(&self, id: ItemId, project_id: ProjectId) -> CatalogResult<Item> {
        let mut table = self.table.write().map_err(|_| StoreError::LockPoisoned)?;
        let item = table.get_mut(id, project_id)?;
        item.removed = true;
        Ok(item.clone())
    }

    async fn reprioritize(
        &self,
        id: ItemId,
        project_id: ProjectId,
        new_priority: i32,
    ) -> CatalogResult<Vec<Item>> {
        let mut table = self.table.write().map_err(|_| StoreError::LockPoisoned)?;
        let moved = {
            let item = table.get_mut(id, project_id)?;
            item.priority = new_priority;
            item.clone()
        };

        let mut affected = vec![moved];
        for item in table.rows.values_mut() {
            if item.project_id == project_id && item.id != id && item.priority >= new_priority {
                item.priority += 1;
                affected.push(item.clone());
            }
        }
        Ok(affected)
    }
}
