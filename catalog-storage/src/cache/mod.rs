//! Position-indexed list cache.
//!
//! Paginated listings are served from a key-value store where each entry is
//! the snapshot of the item that occupied one rank of a listing.
//!
//! # Layout
//!
//! - [`CacheKey`] builds `"{item_id}:{project_id}:{rank}"` keys and the
//!   wildcard scan patterns derived from them
//! - [`KeyValueStore`] abstracts the backend (Redis in production,
//!   [`InMemoryKeyValueStore`] in tests)
//! - [`PositionCache`] probes windows and writes snapshots back
//!
//! # Example
//!
//! ```ignore
//! let cache = PositionCache::new(Arc::new(RedisKeyValueStore::connect(url).await?));
//!
//! let probe = cache.probe(Window::new(10, 0)).await?;
//! if !probe.is_complete() {
//!     // read the gap from the store of record, then write it back
//!     cache.insert(&item, rank, Expiry::After(Duration::from_secs(60))).await?;
//! }
//! ```

pub mod key;
pub mod memory;
pub mod position;
pub mod redis_backend;
pub mod traits;

pub use key::{CacheKey, Position, WILDCARD};
pub use memory::InMemoryKeyValueStore;
pub use position::{PositionCache, ProbeResult, PutMode};
pub use redis_backend::{RedisCacheError, RedisKeyValueStore};
pub use traits::{CacheStats, Expiry, KeyValueStore};
