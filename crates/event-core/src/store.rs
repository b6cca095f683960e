//! Event aggregate storage seam.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::event::{Event, EventKey};
use crate::filter::EventFilter;

/// Load/save of event aggregates keyed by `(source_id, message_id)`.
///
/// Saves are last-write-wins per key.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn load(&self, key: EventKey) -> Result<Option<Event>, StoreError>;

    async fn save(&self, event: &Event) -> Result<(), StoreError>;

    /// Events matching the filter's predicates, in no particular order.
    async fn find(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError>;

    /// Load an event that must exist.
    async fn get(&self, key: EventKey) -> Result<Event, StoreError> {
        self.load(key).await?.ok_or(StoreError::NotFound(key))
    }
}

/// In-memory store for tests and single-process tools.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<HashMap<EventKey, Event>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn load(&self, key: EventKey) -> Result<Option<Event>, StoreError> {
        Ok(self.events.read().await.get(&key).cloned())
    }

    async fn save(&self, event: &Event) -> Result<(), StoreError> {
        self.events.write().await.insert(event.key(), event.clone());
        Ok(())
    }

    async fn find(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let events = self.events.read().await;
        Ok(events
            .values()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::date::EventDate;
    use crate::event::DeletionReason;
    use crate::filter::compile;

    fn event(id: i64, day: u32) -> Event {
        let mut event = Event::new(EventKey::new(-100, id));
        event.start = Some(EventDate::new(2024, 7, Some(day)));
        event
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryEventStore::new();
        let key = EventKey::new(-100, 1);
        assert!(store.load(key).await.unwrap().is_none());
        assert!(matches!(store.get(key).await, Err(StoreError::NotFound(k)) if k == key));

        store.save(&event(1, 12)).await.unwrap();
        let mut updated = event(1, 13);
        updated.title = Some("Updated".to_string());
        store.save(&updated).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(key).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_find_applies_filter() {
        let store = MemoryEventStore::new();
        store.save(&event(1, 12)).await.unwrap();
        let mut deleted = event(2, 13);
        deleted.mark_deleted(DeletionReason::Duplicate);
        store.save(&deleted).await.unwrap();
        store.save(&Event::new(EventKey::new(-100, 3))).await.unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let found = store.find(&compile::<&str>(&[], today)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message_id(), 1);
    }
}
