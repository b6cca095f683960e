//! Event catalogue service.
//!
//! This crate wires the [`event_core`] pipeline to a store and exposes the
//! operations the chat transport calls:
//!
//! - [`Catalogue::handle_message`] - parse a new or edited announcement and
//!   return the validity notification [`Intent`](event_core::Intent)
//! - [`Catalogue::render`] - render the event list for filter tokens
//! - [`Catalogue::mark_dirty`] - invalidate cached lists after outside changes
//! - moderation: delete, restore, notification and discussion settings
//!
//! [`RefreshJob`] is the scheduled writer that re-renders configured lists,
//! reports the ones that changed and clears the dirty flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use catalogue::{Catalogue, CatalogueConfig};
//! use event_core::{EventKey, MessageInput, SystemClock};
//!
//! let config = CatalogueConfig::from_env()?;
//! let db = database::Database::connect(&config.database_url).await?;
//! db.migrate().await?;
//!
//! let catalogue = Catalogue::new(Arc::new(db), &config, Arc::new(SystemClock));
//! let outcome = catalogue
//!     .handle_message(EventKey::new(-1001, 42), &input, false)
//!     .await?;
//! let chunks = catalogue.render(&["i", "w"]).await?;
//! ```

pub mod config;
pub mod error;
pub mod refresh;
pub mod service;

pub use config::CatalogueConfig;
pub use error::CatalogueError;
pub use refresh::{RefreshJob, RefreshUpdate};
pub use service::{Catalogue, MessageOutcome};
