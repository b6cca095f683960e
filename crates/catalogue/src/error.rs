//! Error types for catalogue operations.

use event_core::StoreError;
use thiserror::Error;

/// Errors that can occur in the catalogue service.
#[derive(Debug, Error)]
pub enum CatalogueError {
    /// The event store failed. Passed through unchanged, never retried.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An environment variable held an unusable value.
    #[error("configuration error: {0}")]
    Configuration(String),
}
