//! Database models.

use event_core::{Event, EventKey};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::Result;

/// A stored event row. The aggregate itself lives in `payload` as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EventRow {
    /// Channel the announcement was posted in.
    pub source_id: i64,
    /// Message id within the channel.
    pub message_id: i64,
    /// JSON-encoded [`Event`].
    pub payload: String,
    /// Mirrors `Event::deleted` for filtering without decoding.
    pub deleted: bool,
    /// Last update timestamp.
    pub updated_at: String,
}

impl EventRow {
    pub fn key(&self) -> EventKey {
        EventKey::new(self.source_id, self.message_id)
    }

    /// Decode the stored aggregate.
    pub fn to_event(&self) -> Result<Event> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}
