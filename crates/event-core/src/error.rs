//! Error types for event storage.

use thiserror::Error;

use crate::event::EventKey;

/// Errors returned by event stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No event exists for the key.
    #[error("event not found: {0}")]
    NotFound(EventKey),

    /// Storage or retrieval failure in the backend.
    #[error("event store error: {0}")]
    Backend(String),

    /// A stored event could not be encoded or decoded.
    #[error("event serialization error: {0}")]
    Serialization(String),
}
