//! Item snapshots and the analytics events derived from them.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{ItemId, NullableText, ProjectId, Timestamp};

/// A catalog item as owned by the store of record.
///
/// The position cache and the analytics store hold denormalized copies of
/// this snapshot; it is the JSON value stored under every cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub project_id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: NullableText,
    pub priority: i32,
    pub removed: bool,
    pub created_at: Timestamp,
}

impl Item {
    /// The `(id, project_id)` pair identifying this item.
    pub fn key(&self) -> (ItemId, ProjectId) {
        (self.id, self.project_id)
    }
}

/// A change event published for every mutated item row.
///
/// `event_time` is assigned once, when the event is captured at publish
/// time, and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    #[serde(flatten)]
    pub item: Item,
    pub event_time: Timestamp,
}

impl AnalyticsEvent {
    /// Capture an event for `item` stamped with the current time.
    pub fn capture(item: Item) -> Self {
        Self::captured_at(item, Utc::now())
    }

    /// Capture an event with an explicit timestamp.
    pub fn captured_at(item: Item, event_time: Timestamp) -> Self {
        Self { item, event_time }
    }
}
