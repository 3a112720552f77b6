//! Fixed-threshold event buffer.

use catalog_core::AnalyticsEvent;

/// Accumulates events until `batch_size` is reached.
///
/// Owned by a single relay worker; the threshold check and the swap to a
/// fresh buffer happen in the same call.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<AnalyticsEvent>,
    batch_size: usize,
}

impl EventBuffer {
    /// Create a buffer flushing every `batch_size` events. Zero is treated
    /// as one.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            events: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    /// Append `event`. Returns the full batch when the threshold is reached,
    /// leaving the buffer empty.
    pub fn push(&mut self, event: AnalyticsEvent) -> Option<Vec<AnalyticsEvent>> {
        self.events.push(event);
        if self.events.len() >= self.batch_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Take whatever is buffered, possibly nothing.
    pub fn take(&mut self) -> Vec<AnalyticsEvent> {
        std::mem::replace(&mut self.events, Vec::with_capacity(self.batch_size))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::{Item, NullableText};
    use chrono::Utc;
    use proptest::prelude::*;

    fn event(id: i32) -> AnalyticsEvent {
        AnalyticsEvent::capture(Item {
            id,
            project_id: 1,
            name: format!("item-{id}"),
            description: NullableText::null(),
            priority: id,
            removed: false,
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_push_returns_batch_at_threshold() {
        let mut buffer = EventBuffer::new(3);
        assert!(buffer.push(event(1)).is_none());
        assert!(buffer.push(event(2)).is_none());

        let batch = buffer.push(event(3)).expect("full batch");
        assert_eq!(batch.iter().map(|e| e.item.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_batch_size_flushes_every_event() {
        let mut buffer = EventBuffer::new(0);
        assert_eq!(buffer.batch_size(), 1);
        assert_eq!(buffer.push(event(1)).map(|b| b.len()), Some(1));
    }

    proptest! {
        #[test]
        fn prop_no_event_lost_or_duplicated(batch_size in 1usize..16, count in 0usize..100) {
            let mut buffer = EventBuffer::new(batch_size);
            let mut flushed = Vec::new();
            for id in 0..count {
                if let Some(batch) = buffer.push(event(id as i32)) {
                    prop_assert_eq!(batch.len(), batch_size);
                    flushed.extend(batch);
                }
            }
            prop_assert!(buffer.len() < batch_size);
            flushed.extend(buffer.take());

            let ids: Vec<i32> = flushed.iter().map(|e| e.item.id).collect();
            prop_assert_eq!(ids, (0..count as i32).collect::<Vec<_>>());
        }
    }
}
