//! (Re)parsing a message into an [`Event`].

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::date::DateExtractor;
use crate::event::Event;
use crate::hashtags::classify;
use crate::message::MessageInput;
use crate::regions::RegionTable;

/// Validity and past-dateness before and after one parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub was_valid: bool,
    pub is_valid: bool,
    pub was_in_past: bool,
    pub is_in_past: bool,
    pub is_edit: bool,
}

/// First line of the text, trimmed, even when it is blank. `None` only for
/// empty text.
pub fn extract_title(text: &str) -> Option<String> {
    text.lines().next().map(|line| line.trim().to_string())
}

/// Applies the parsing pipeline to event aggregates.
pub struct EventUpdater {
    extractor: DateExtractor,
    regions: RegionTable,
    clock: Arc<dyn Clock>,
}

impl Default for EventUpdater {
    fn default() -> Self {
        Self::new(RegionTable::default(), Arc::new(SystemClock))
    }
}

impl EventUpdater {
    pub fn new(regions: RegionTable, clock: Arc<dyn Clock>) -> Self {
        Self {
            extractor: DateExtractor::new(),
            regions,
            clock,
        }
    }

    /// Parser with the default region table and a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::new(RegionTable::default(), clock)
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    /// Update `event` from a new or edited message.
    ///
    /// A brand-new message counts as previously valid. An edit that leaves
    /// the text untouched is not re-parsed unless `force` is set.
    ///
    /// Returns `None` for deleted events: their fields stay current but no
    /// notification or cache change may follow.
    pub fn update(
        &self,
        event: &mut Event,
        input: &MessageInput,
        is_edit: bool,
        force: bool,
    ) -> Option<Transition> {
        let today = self.clock.today();
        let was_valid = event.is_valid_from_parse() || !is_edit;
        let was_in_past = event.start_in_past(today);
        let unchanged = is_edit && !force && event.text.as_deref() == Some(input.text.as_str());

        event.text = Some(input.text.clone());
        event.entities = input.entities.clone();
        event.message_date = Some(input.date);
        if input.edit_date.is_some() {
            event.edit_date = input.edit_date;
        }
        // The platform cannot strip media from a message, so no media means "unchanged".
        if input.media.is_some() {
            event.media = input.media.clone();
        }

        if unchanged {
            debug!("Edit of {} left the text unchanged, skipping parse", event.key());
        } else {
            self.parse_into(event, input, today);
        }

        if event.deleted {
            debug!("Event {} is deleted, no transition", event.key());
            return None;
        }

        Some(Transition {
            was_valid,
            is_valid: event.is_valid_from_parse(),
            was_in_past,
            is_in_past: event.start_in_past(today),
            is_edit,
        })
    }

    fn parse_into(&self, event: &mut Event, input: &MessageInput, today: NaiveDate) {
        let hashtags = input.hashtags();

        event.title = extract_title(&input.text);
        match self.extractor.extract(&input.text) {
            Some(range) => event.set_dates(range),
            None => event.clear_dates(),
        }

        let classification = classify(&hashtags);
        if let Some(category) = classification.category {
            event.category = Some(category);
        }
        event.canceled = classification.canceled;
        event.soon = classification.soon;

        event.dates_from_hashtags = false;
        if event.start.is_none() {
            if let Some(date) = classification.month_date(today) {
                event.start = Some(date);
                event.end = None;
                event.dates_from_hashtags = true;
            }
        }

        event.region = self.regions.resolve(&hashtags);
        event.hashtags = hashtags.into_iter().collect();

        debug!(
            "Parsed {}: start={:?} end={:?} region={:?} category={:?} canceled={} soon={}",
            event.key(),
            event.start,
            event.end,
            event.region,
            event.category,
            event.canceled,
            event.soon
        );
    }
}
