//! Event aggregate storage.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use event_core::{Event, EventFilter, EventKey, EventStore, StoreError};

use crate::models::EventRow;
use crate::{Database, DatabaseError, Result};

/// Insert or replace an event. Last write wins.
pub async fn upsert_event(pool: &SqlitePool, event: &Event) -> Result<()> {
    let payload = serde_json::to_string(event)?;

    sqlx::query(
        r#"
        INSERT INTO events (source_id, message_id, payload, deleted)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(source_id, message_id) DO UPDATE SET
            payload = excluded.payload,
            deleted = excluded.deleted,
            updated_at = datetime('now')
        "#,
    )
    .bind(event.source_id())
    .bind(event.message_id())
    .bind(payload)
    .bind(event.deleted)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get an event row by key.
pub async fn get_event_row(pool: &SqlitePool, key: EventKey) -> Result<Option<EventRow>> {
    let row = sqlx::query_as::<_, EventRow>(
        r#"
        SELECT source_id, message_id, payload, deleted, updated_at
        FROM events
        WHERE source_id = ? AND message_id = ?
        "#,
    )
    .bind(key.source_id)
    .bind(key.message_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Get an event by key, failing if it does not exist.
pub async fn get_event(pool: &SqlitePool, key: EventKey) -> Result<Event> {
    get_event_row(pool, key)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "event",
            id: key.to_string(),
        })?
        .to_event()
}

/// List all events that are not deleted. Fails on the first payload that
/// does not decode.
pub async fn list_active_events(pool: &SqlitePool) -> Result<Vec<Event>> {
    let rows = sqlx::query_as::<_, EventRow>(
        r#"
        SELECT source_id, message_id, payload, deleted, updated_at
        FROM events
        WHERE deleted = 0
        ORDER BY source_id, message_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            row.to_event()
                .inspect_err(|err| warn!("Undecodable event {}: {}", row.key(), err))
        })
        .collect()
}

/// Count stored events, deleted ones included.
pub async fn count_events(pool: &SqlitePool) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

#[async_trait]
impl EventStore for Database {
    async fn load(&self, key: EventKey) -> std::result::Result<Option<Event>, StoreError> {
        match get_event_row(self.pool(), key).await? {
            Some(row) => Ok(Some(row.to_event()?)),
            None => Ok(None),
        }
    }

    async fn save(&self, event: &Event) -> std::result::Result<(), StoreError> {
        upsert_event(self.pool(), event).await?;
        debug!("Saved event {}", event.key());
        Ok(())
    }

    async fn find(&self, filter: &EventFilter) -> std::result::Result<Vec<Event>, StoreError> {
        let events = list_active_events(self.pool()).await?;
        Ok(events
            .into_iter()
            .filter(|event| filter.matches(event))
            .collect())
    }
}
