//! Background Jobs for the Catalog API
//!
//! - `event_relay`: Drains item change events into the analytics store
//!
//! # Usage
//!
//! The relay is started before the server accepts requests and stopped
//! after it has shut down, so its last partial batch is still flushed:
//!
//! ```ignore
//! use catalog_api::jobs::start_event_relay;
//!
//! let relay = start_event_relay(bus, executor, "items", relay_config).await?;
//! // ... serve ...
//! relay.stop().await;
//! ```

pub mod event_relay;

pub use event_relay::start_event_relay;
