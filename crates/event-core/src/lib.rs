//! Event parsing, validity transitions and filtered event lists.
//!
//! This crate turns free-form channel announcements into structured
//! [`Event`] records and serves pre-rendered event lists. It defines:
//!
//! - [`DateExtractor`], [`classify`] and [`RegionTable`] - the text pipeline
//! - [`EventUpdater`] - (re)parses a message into an event and reports a [`Transition`]
//! - [`decide`] - maps a transition to a moderator notification [`Intent`]
//! - [`compile`] - turns filter tokens into an [`EventFilter`]
//! - [`EventListCache`], [`EventFormatter`] and [`MessageSplitter`] - list rendering
//! - [`EventStore`] - the persistence seam, with [`MemoryEventStore`] for tests
//!
//! No transport or storage type is imported here.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use event_core::{decide, Event, EventKey, EventUpdater, Intent, MessageInput};
//!
//! let updater = EventUpdater::default();
//! let mut event = Event::new(EventKey::new(-1001, 42));
//! let input = MessageInput::from_plain_text("Festival\n12-14/07/2099 #italia #freeparty", Utc::now());
//!
//! let transition = updater.update(&mut event, &input, false, false).unwrap();
//! assert_eq!(decide(&transition, event.send_validity_notifications), Intent::NoOp);
//! ```

pub mod cache;
pub mod clock;
pub mod date;
pub mod error;
pub mod event;
pub mod filter;
pub mod formatting;
pub mod hashtags;
pub mod message;
pub mod notifier;
pub mod regions;
pub mod splitter;
pub mod store;
pub mod updater;

pub use cache::EventListCache;
pub use clock::{Clock, FixedClock, SystemClock};
pub use date::{DateExtractor, DateParseError, DateRange, EventDate};
pub use error::StoreError;
pub use event::{DeletionReason, DiscussionRef, Event, EventKey, NoticeRef, UnknownDeletionReason};
pub use filter::{compile, EventFilter, GroupKey, OrderKey, Predicate};
pub use formatting::{EventFormatter, FormattedLine};
pub use hashtags::{classify, Category, Classification};
pub use message::{EntityKind, MediaKind, MediaRef, MessageEntity, MessageInput};
pub use notifier::{decide, Intent};
pub use regions::{RegionId, RegionTable, RegionTableError};
pub use splitter::MessageSplitter;
pub use store::{EventStore, MemoryEventStore};
pub use updater::{EventUpdater, Transition};
