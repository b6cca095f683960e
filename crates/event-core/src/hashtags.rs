//! Hashtag normalization and classification.
//!
//! All tables here are ordered association lists: the first entry with a
//! matching hashtag wins, so order is part of the behavior.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::date::EventDate;

/// Event category derived from hashtags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    FreeParty,
    Legal,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FreeParty => "free_party",
            Self::Legal => "legal",
            Self::Other => "other",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::FreeParty => "🏴",
            Self::Legal => "🎟",
            Self::Other => "🎵",
        }
    }
}

pub const CATEGORY_TABLE: &[(Category, &[&str])] = &[
    (Category::FreeParty, &["freeparty", "free", "teknival", "rave"]),
    (Category::Legal, &["legal", "legalparty", "club", "festival"]),
    (Category::Other, &["other", "altro"]),
];

pub const CANCELED_TAGS: &[&str] = &[
    "cancellato",
    "cancellata",
    "annullato",
    "annullata",
    "canceled",
    "cancelled",
];

pub const SOON_TAGS: &[&str] = &["soon", "comingsoon", "prossimamente", "tba"];

/// One entry per month, in calendar order.
pub const MONTH_TABLE: [(u32, &[&str]); 12] = [
    (1, &["january", "gennaio"]),
    (2, &["february", "febbraio"]),
    (3, &["march", "marzo"]),
    (4, &["april", "aprile"]),
    (5, &["may", "maggio"]),
    (6, &["june", "giugno"]),
    (7, &["july", "luglio"]),
    (8, &["august", "agosto"]),
    (9, &["september", "settembre"]),
    (10, &["october", "ottobre"]),
    (11, &["november", "novembre"]),
    (12, &["december", "dicembre"]),
];

/// Normalize raw hashtag text: strip `#`, lowercase, keep word characters.
pub fn normalize_hashtag(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('#')
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn any_tag(hashtags: &BTreeSet<String>, tags: &[&str]) -> bool {
    tags.iter().any(|tag| hashtags.contains(*tag))
}

/// Flags and hints derived from one message's hashtags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    /// First category hit in table order; `None` keeps any prior category.
    pub category: Option<Category>,
    pub canceled: bool,
    pub soon: bool,
    /// Month named by a month hashtag (1-12).
    pub month: Option<u32>,
}

impl Classification {
    /// Date implied by the month hashtag: the next occurrence of that month,
    /// counting the current month as upcoming.
    pub fn month_date(&self, today: NaiveDate) -> Option<EventDate> {
        let month = self.month?;
        let year = if month < today.month() {
            today.year() + 1
        } else {
            today.year()
        };
        Some(EventDate::month_only(year, month))
    }
}

/// Classify a set of normalized hashtags.
pub fn classify(hashtags: &BTreeSet<String>) -> Classification {
    let category = CATEGORY_TABLE
        .iter()
        .find(|(_, tags)| any_tag(hashtags, tags))
        .map(|(category, _)| *category);

    let month = MONTH_TABLE
        .iter()
        .find(|(_, tags)| any_tag(hashtags, tags))
        .map(|(month, _)| *month);

    Classification {
        category,
        canceled: any_tag(hashtags, CANCELED_TAGS),
        soon: any_tag(hashtags, SOON_TAGS),
        month,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_normalize_hashtag() {
        assert_eq!(normalize_hashtag("#FreeParty"), Some("freeparty".to_string()));
        assert_eq!(normalize_hashtag(" #nord_italia "), Some("nord_italia".to_string()));
        assert_eq!(normalize_hashtag("#"), None);
    }

    #[test]
    fn test_category_first_hit_in_table_order() {
        let result = classify(&tags(&["club", "teknival"]));
        assert_eq!(result.category, Some(Category::FreeParty));

        let result = classify(&tags(&["altro", "legal"]));
        assert_eq!(result.category, Some(Category::Legal));
    }

    #[test]
    fn test_no_category() {
        assert_eq!(classify(&tags(&["italia"])).category, None);
    }

    #[test]
    fn test_flags_follow_presence() {
        let result = classify(&tags(&["annullato", "tba"]));
        assert!(result.canceled);
        assert!(result.soon);

        let result = classify(&tags(&["italia"]));
        assert!(!result.canceled);
        assert!(!result.soon);
    }

    #[test]
    fn test_month_date_rolls_to_next_year() {
        let today = NaiveDate::from_ymd_opt(2024, 10, 16).unwrap();

        let result = classify(&tags(&["march"]));
        assert_eq!(result.month_date(today), Some(EventDate::month_only(2025, 3)));

        let result = classify(&tags(&["ottobre"]));
        assert_eq!(result.month_date(today), Some(EventDate::month_only(2024, 10)));

        let result = classify(&tags(&["dicembre"]));
        assert_eq!(result.month_date(today), Some(EventDate::month_only(2024, 12)));
    }

    #[test]
    fn test_no_month_no_date() {
        let today = NaiveDate::from_ymd_opt(2024, 10, 16).unwrap();
        assert_eq!(classify(&tags(&["free"])).month_date(today), None);
    }
}
