//! The event aggregate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::date::{DateRange, EventDate};
use crate::hashtags::Category;
use crate::message::{MediaRef, MessageEntity};
use crate::regions::RegionId;

/// Identity of an event: the channel and message it was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub source_id: i64,
    pub message_id: i64,
}

impl EventKey {
    pub fn new(source_id: i64, message_id: i64) -> Self {
        Self {
            source_id,
            message_id,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source_id, self.message_id)
    }
}

/// Why a moderator removed an event from listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionReason {
    Duplicate,
    NotAnEvent,
    Expired,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown deletion reason: {0:?}")]
pub struct UnknownDeletionReason(pub String);

impl FromStr for DeletionReason {
    type Err = UnknownDeletionReason;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "duplicate" | "dup" => Ok(Self::Duplicate),
            "not_an_event" | "notanevent" | "not-an-event" => Ok(Self::NotAnEvent),
            "expired" => Ok(Self::Expired),
            "other" => Ok(Self::Other),
            _ => Err(UnknownDeletionReason(value.to_string())),
        }
    }
}

/// A message sent by the bot that can later be edited or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// The post in the linked discussion group mirroring this event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionRef {
    pub chat_id: i64,
    pub message_id: i64,
}

fn default_true() -> bool {
    true
}

/// One parsed announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    key: EventKey,

    pub title: Option<String>,
    pub start: Option<EventDate>,
    pub end: Option<EventDate>,
    pub region: Option<RegionId>,
    pub category: Option<Category>,

    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub soon: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub deletion_reason: Option<DeletionReason>,
    #[serde(default)]
    pub dates_from_hashtags: bool,
    #[serde(default = "default_true")]
    pub send_validity_notifications: bool,

    /// Kept across re-parses unless a new payload carries media.
    #[serde(default)]
    pub media: Option<MediaRef>,

    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    /// Hashtags found on the last parse, lowercased and without `#`.
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub message_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub edit_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub validity_notice: Option<NoticeRef>,
    #[serde(default)]
    pub discussion_post: Option<DiscussionRef>,
}

impl Event {
    /// A fresh, unparsed event.
    pub fn new(key: EventKey) -> Self {
        Self {
            key,
            title: None,
            start: None,
            end: None,
            region: None,
            category: None,
            canceled: false,
            soon: false,
            deleted: false,
            deletion_reason: None,
            dates_from_hashtags: false,
            send_validity_notifications: true,
            media: None,
            text: None,
            entities: Vec::new(),
            hashtags: Vec::new(),
            message_date: None,
            edit_date: None,
            validity_notice: None,
            discussion_post: None,
        }
    }

    pub fn key(&self) -> EventKey {
        self.key
    }

    pub fn source_id(&self) -> i64 {
        self.key.source_id
    }

    pub fn message_id(&self) -> i64 {
        self.key.message_id
    }

    /// Valid means the last parse produced a start date.
    pub fn is_valid_from_parse(&self) -> bool {
        self.start.is_some()
    }

    /// Whether the start date lies before `today`.
    ///
    /// With an unknown start day only whole months count as past.
    pub fn start_in_past(&self, today: NaiveDate) -> bool {
        match self.start {
            Some(EventDate {
                year,
                month,
                day: None,
            }) => (year, month) < (today.year(), today.month()),
            Some(start) => start.first_day().is_some_and(|day| day < today),
            None => false,
        }
    }

    pub fn set_dates(&mut self, range: DateRange) {
        self.start = Some(range.start);
        self.end = range.end;
    }

    pub fn clear_dates(&mut self) {
        self.start = None;
        self.end = None;
    }

    /// Whole-day span covered by the event: unknown days widen to the month,
    /// a missing end means a single date.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.start?;
        let end = self.end.unwrap_or(start);
        Some((start.first_day()?, end.last_day()?))
    }

    /// Hide the event from listings.
    pub fn mark_deleted(&mut self, reason: DeletionReason) {
        self.deleted = true;
        self.deletion_reason = Some(reason);
    }

    pub fn restore(&mut self) {
        self.deleted = false;
        self.deletion_reason = None;
    }

    pub fn set_send_validity_notifications(&mut self, enabled: bool) {
        self.send_validity_notifications = enabled;
    }

    /// Remember the notice sent for this event, returning the one it replaces.
    pub fn record_notice(&mut self, notice: NoticeRef) -> Option<NoticeRef> {
        self.validity_notice.replace(notice)
    }

    /// Forget the current notice so the caller can retract it.
    pub fn take_notice(&mut self) -> Option<NoticeRef> {
        self.validity_notice.take()
    }
}
