//! Catalog Core - Entity Types
//!
//! Pure data structures shared by every catalog crate: the item snapshot,
//! listing windows, the splice primitive used to rebuild windows, and the
//! error taxonomy.

use chrono::{DateTime, Utc};

pub mod error;
pub mod item;
pub mod merge;
pub mod nullable;
pub mod pagination;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Item identifier assigned by the store of record.
pub type ItemId = i32;

/// Project identifier scoping a set of items.
pub type ProjectId = i32;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use error::{
    AnalyticsError, BusError, CacheError, CatalogError, CatalogResult, ConfigError, StoreError,
};
pub use item::{AnalyticsEvent, Item};
pub use merge::splice;
pub use nullable::NullableText;
pub use pagination::{
    ListMeta, ListingPage, Window, DEFAULT_LIMIT, DEFAULT_OFFSET, MAX_LIMIT, MAX_OFFSET,
};
