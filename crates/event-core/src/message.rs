//! Inbound announcement payloads.
//!
//! A [`MessageInput`] is a plain value built by the transport layer from
//! whatever the chat platform delivered. Entity offsets and lengths are in
//! UTF-16 code units, matching how the platform reports them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::hashtags::normalize_hashtag;

/// Rich-text entity types the parser cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Hashtag,
    Url,
    TextLink,
    Bold,
    Other,
}

/// A positional entity inside the message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    /// Start position in UTF-16 code units.
    pub offset: usize,
    /// Length in UTF-16 code units.
    pub length: usize,
    pub kind: EntityKind,
}

impl MessageEntity {
    pub fn new(offset: usize, length: usize, kind: EntityKind) -> Self {
        Self {
            offset,
            length,
            kind,
        }
    }

    pub fn hashtag(offset: usize, length: usize) -> Self {
        Self::new(offset, length, EntityKind::Hashtag)
    }
}

/// Attached media kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Animation,
    Document,
}

/// Opaque reference to media stored by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub file_id: String,
    pub kind: MediaKind,
    /// Album identifier when the media belongs to a group of messages.
    #[serde(default)]
    pub group_id: Option<String>,
}

/// Text, entities and metadata of one posted or edited announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInput {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    #[serde(default)]
    pub media: Option<MediaRef>,
    /// When the message was originally posted.
    pub date: DateTime<Utc>,
    /// When the message was last edited, if ever.
    #[serde(default)]
    pub edit_date: Option<DateTime<Utc>>,
}

impl MessageInput {
    /// Create an input with explicit entities.
    pub fn new(text: impl Into<String>, entities: Vec<MessageEntity>, date: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            entities,
            media: None,
            date,
            edit_date: None,
        }
    }

    /// Create an input from bare text, deriving hashtag entities from
    /// whitespace-delimited `#words`.
    ///
    /// Only meant for text that did not come through the chat platform
    /// (files, the command line); platform messages carry real entities.
    pub fn from_plain_text(text: impl Into<String>, date: DateTime<Utc>) -> Self {
        let text = text.into();
        let entities = scan_hashtags(&text);
        Self::new(text, entities, date)
    }

    pub fn with_media(mut self, media: MediaRef) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_edit_date(mut self, edit_date: DateTime<Utc>) -> Self {
        self.edit_date = Some(edit_date);
        self
    }

    /// Lowercased hashtags (without `#`) located through hashtag entities.
    pub fn hashtags(&self) -> BTreeSet<String> {
        let units: Vec<u16> = self.text.encode_utf16().collect();
        self.entities
            .iter()
            .filter(|entity| entity.kind == EntityKind::Hashtag)
            .filter_map(|entity| {
                let slice = entity
                    .offset
                    .checked_add(entity.length)
                    .and_then(|end| units.get(entity.offset..end));
                match slice {
                    Some(slice) => normalize_hashtag(&String::from_utf16_lossy(slice)),
                    None => {
                        warn!(
                            "Hashtag entity {}+{} outside of text ({} units)",
                            entity.offset,
                            entity.length,
                            units.len()
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

/// Find `#word` tokens that start a whitespace-delimited token.
fn scan_hashtags(text: &str) -> Vec<MessageEntity> {
    let mut entities = Vec::new();
    let mut position = 0;
    let mut previous: Option<char> = None;
    let mut current: Option<(usize, usize)> = None;

    for ch in text.chars() {
        let width = ch.len_utf16();
        if let Some((offset, length)) = current {
            if ch.is_alphanumeric() || ch == '_' {
                current = Some((offset, length + width));
            } else {
                push_hashtag(&mut entities, offset, length);
                current = None;
            }
        }
        if current.is_none() && ch == '#' && previous.map_or(true, char::is_whitespace) {
            current = Some((position, width));
        }
        position += width;
        previous = Some(ch);
    }

    if let Some((offset, length)) = current {
        push_hashtag(&mut entities, offset, length);
    }
    entities
}

fn push_hashtag(entities: &mut Vec<MessageEntity>, offset: usize, length: usize) {
    // A lone '#' is not a hashtag.
    if length > 1 {
        entities.push(MessageEntity::hashtag(offset, length));
    }
}
