//! Event Relay Background Task
//!
//! Wires the change-event subject to the analytics table: a [`BatchRelay`]
//! subscribed on the bus, flushing through an [`ItemEventSender`].

use std::sync::Arc;

use catalog_events::{
    AnalyticsExecutor, BatchRelay, EventBus, ItemEventSender, RelayConfig, RelayHandle,
};

use crate::error::ApiResult;

/// Subscribe the relay and spawn its worker.
///
/// # Arguments
/// - `bus`: Pub/sub transport carrying change events
/// - `executor`: Analytics store connection
/// - `table`: Analytics table receiving the events
/// - `config`: Subject and batching parameters
///
/// # Errors
/// Returns error if the configuration is invalid or the subscription fails.
pub async fn start_event_relay<E>(
    bus: Arc<dyn EventBus>,
    executor: E,
    table: &str,
    config: RelayConfig,
) -> ApiResult<RelayHandle>
where
    E: AnalyticsExecutor + 'static,
{
    let subject = config.subject.clone();
    let sender = ItemEventSender::new(executor, table);
    let handle = BatchRelay::new(bus, sender, config).start().await?;
    tracing::info!(subject = %subject, table, "Event relay running");
    Ok(handle)
}
