//! Change-event publishing for mutated items.

use std::sync::Arc;

use catalog_core::{AnalyticsEvent, BusError, CatalogResult, Item};
use tracing::debug;

use crate::bus::EventBus;

/// Default subject for item change events.
pub const DEFAULT_SUBJECT: &str = "logs.item";

/// Publishes one [`AnalyticsEvent`] per mutated item row.
#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
    subject: String,
}

impl EventPublisher {
    pub fn new(bus: Arc<dyn EventBus>, subject: impl Into<String>) -> Self {
        Self {
            bus,
            subject: subject.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Capture `item` at the current time and publish it.
    pub async fn publish(&self, item: &Item) -> CatalogResult<AnalyticsEvent> {
        let event = AnalyticsEvent::capture(item.clone());
        let payload = serde_json::to_string(&event).map_err(|e| BusError::PublishFailed {
            subject: self.subject.clone(),
            reason: e.to_string(),
        })?;

        self.bus.publish(&self.subject, &payload).await?;
        debug!(
            subject = %self.subject,
            item_id = item.id,
            project_id = item.project_id,
            "Published item change event"
        );
        Ok(event)
    }
}

/// Decode a change-event payload received on `subject`.
pub fn decode_event(subject: &str, payload: &str) -> Result<AnalyticsEvent, BusError> {
    serde_json::from_str(payload).map_err(|e| BusError::Decode {
        subject: subject.to_string(),
        reason: e.to_string(),
    })
}
