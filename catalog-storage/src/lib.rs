//! Catalog Storage - List Cache and Store of Record
//!
//! Serves paginated item listings from a position-indexed cache, falling
//! back to the store of record for the ranks the cache cannot answer.
//!
//! - [`cache`] holds the key-value backends and the [`PositionCache`]
//! - [`reconcile`] turns a cache probe into a single store read and a splice
//! - [`store`] abstracts the relational store of record

pub mod cache;
pub mod reconcile;
pub mod store;

pub use cache::{
    CacheKey, CacheStats, Expiry, InMemoryKeyValueStore, KeyValueStore, Position, PositionCache,
    ProbeResult, PutMode, RedisCacheError, RedisKeyValueStore, WILDCARD,
};
pub use reconcile::{gap_window, merge, reconcile, GapPlan, Reconciliation};
pub use store::{InMemoryItemStore, ItemStore, WindowRead};
