//! Catalog Events - Change-Event Relay
//!
//! Every mutated item row is published as an [`AnalyticsEvent`] on a
//! pub/sub subject. The [`BatchRelay`] consumes that subject and writes the
//! events into the analytics store in fixed-size batches.
//!
//! ```text
//! mutation ──▶ EventPublisher ──▶ EventBus ──▶ BatchRelay ──▶ BatchSender ──▶ analytics
//! ```
//!
//! [`AnalyticsEvent`]: catalog_core::AnalyticsEvent

pub mod buffer;
pub mod bus;
pub mod publish;
pub mod redis_bus;
pub mod relay;
pub mod sender;

pub use buffer::EventBuffer;
pub use bus::{EventBus, InMemoryEventBus, Message, Subscription};
pub use publish::{decode_event, EventPublisher, DEFAULT_SUBJECT};
pub use redis_bus::RedisEventBus;
pub use relay::{
    BatchRelay, RelayConfig, RelayHandle, RelayMetrics, RelaySnapshot, RelayState,
    DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY,
};
pub use sender::{
    build_insert, AnalyticsExecutor, AnalyticsValue, BatchSender, ItemEventSender,
    COLUMNS_PER_ROW, DEFAULT_TABLE,
};
