//! Event dates and the pattern-based date extractor.
//!
//! Announcements write dates in many compact notations. The extractor only
//! understands two families, tried in a fixed order:
//!
//! 1. day lists sharing one month/year: `12.13.14/05/2024`, `12-13/05/24`,
//!    `12/13/14/05/2024`
//! 2. single days or ranges with optional unknown days: `14/07/2024`,
//!    `12-14/07/2024`, `??/07/2024`, `30-x/05/2024`
//!
//! The first family whose pattern matches decides the outcome. If its dates
//! fail calendar validation the text is treated as having no date at all.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const REGEX_FAIL: &str = "date pattern must compile";

/// Characters that may not directly precede a date pattern.
const PREFIX: &str = r"(?:^|[^0-9A-Za-z/.\-?])";

/// Month and year shared by every date family.
const MONTH_YEAR: &str = r"/(?P<month>\d{1,2})/(?P<year>\d{2,4})\b";

static DAY_LIST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"\.", "-", "/"]
        .iter()
        .map(|sep| {
            Regex::new(&format!(
                r"{PREFIX}(?P<days>\d{{1,2}}(?:{sep}\d{{1,2}})+){MONTH_YEAR}"
            ))
            .expect(REGEX_FAIL)
        })
        .collect()
});

static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{PREFIX}(?P<start>[0-9?xX]{{1,2}})(?:-(?P<end>[0-9?xX]{{1,2}}))?{MONTH_YEAR}"
    ))
    .expect(REGEX_FAIL)
});

/// A calendar date whose day may be unknown.
///
/// `day == None` means "some day within the month".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventDate {
    pub year: i32,
    pub month: u32,
    pub day: Option<u32>,
}

impl EventDate {
    pub fn new(year: i32, month: u32, day: Option<u32>) -> Self {
        Self { year, month, day }
    }

    /// A date for an unknown day of the given month.
    pub fn month_only(year: i32, month: u32) -> Self {
        Self::new(year, month, None)
    }

    /// Whether the month exists and the day (if known) exists in that month.
    pub fn is_valid(&self) -> bool {
        match days_in_month(self.year, self.month) {
            Some(days) => self.day.map_or(true, |day| (1..=days).contains(&day)),
            None => false,
        }
    }

    /// First calendar day covered by this date.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day.unwrap_or(1))
    }

    /// Last calendar day covered by this date (month end when the day is unknown).
    pub fn last_day(&self) -> Option<NaiveDate> {
        let day = match self.day {
            Some(day) => day,
            None => days_in_month(self.year, self.month)?,
        };
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }

    /// Sort key placing unknown days before the first of the month.
    pub fn sort_key(&self) -> (i32, u32, u32) {
        (self.year, self.month, self.day.unwrap_or(0))
    }
}

impl fmt::Display for EventDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.day {
            Some(day) => write!(f, "{:02}/{:02}/{:04}", day, self.month, self.year),
            None => write!(f, "??/{:02}/{:04}", self.month, self.year),
        }
    }
}

/// Error parsing the canonical `dd/mm/yyyy` form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    #[error("expected dd/mm/yyyy, got {0:?}")]
    Format(String),

    #[error("not a calendar date: {0}")]
    Calendar(String),
}

impl FromStr for EventDate {
    type Err = DateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_err = || DateParseError::Format(s.to_string());
        let mut parts = s.trim().split('/');
        let (Some(day), Some(month), Some(year), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(format_err());
        };

        let day = match day {
            "??" => None,
            other => Some(other.parse::<u32>().map_err(|_| format_err())?),
        };
        let month = month.parse::<u32>().map_err(|_| format_err())?;
        let year = year.parse::<i32>().map_err(|_| format_err())?;

        let date = EventDate::new(year, month, day);
        if date.is_valid() {
            Ok(date)
        } else {
            Err(DateParseError::Calendar(s.to_string()))
        }
    }
}

/// Start and optional end date extracted from a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: EventDate,
    pub end: Option<EventDate>,
}

impl DateRange {
    /// Build a range, rejecting calendar-impossible dates and ends before the start.
    pub fn checked(start: EventDate, end: Option<EventDate>) -> Option<Self> {
        if !start.is_valid() {
            return None;
        }
        if let Some(end) = end {
            if !end.is_valid() || end.last_day()? < start.first_day()? {
                return None;
            }
        }
        Some(Self { start, end })
    }
}

/// Number of days in a month, or `None` if the month does not exist.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}

/// Last day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> Option<NaiveDate> {
    let days = days_in_month(date.year(), date.month())?;
    date.with_day(days)
}

/// Expand a two-digit year into the 2000s; reject anything but 2 or 4 digits.
pub fn normalize_year(raw: &str) -> Option<i32> {
    let value = raw.parse::<i32>().ok()?;
    match raw.len() {
        2 => Some(2000 + value),
        4 => Some(value),
        _ => None,
    }
}

/// Parse a day token; `?`/`x` anywhere in the token means an unknown day.
fn parse_day(token: &str) -> Option<Option<u32>> {
    if token.contains(['?', 'x', 'X']) {
        return Some(None);
    }
    token.parse::<u32>().ok().map(Some)
}

enum Matched<'t> {
    DayList(Captures<'t>),
    Range(Captures<'t>),
}

/// Extracts start/end dates using the ordered pattern families.
#[derive(Debug, Clone, Default)]
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract a date range from free text.
    ///
    /// Returns `None` when no family matches, or when the first matching
    /// family produced an impossible date.
    pub fn extract(&self, text: &str) -> Option<DateRange> {
        let matched = Self::first_match(text)?;
        let range = match &matched {
            Matched::DayList(caps) => Self::from_day_list(caps),
            Matched::Range(caps) => Self::from_range(caps),
        };
        if range.is_none() {
            let found = match &matched {
                Matched::DayList(caps) | Matched::Range(caps) => caps[0].trim(),
            };
            debug!("Discarding invalid date match {:?}", found);
        }
        range
    }

    fn first_match(text: &str) -> Option<Matched<'_>> {
        if let Some(caps) = DAY_LIST_PATTERNS.iter().find_map(|re| re.captures(text)) {
            return Some(Matched::DayList(caps));
        }
        RANGE_PATTERN.captures(text).map(Matched::Range)
    }

    fn month_year(caps: &Captures<'_>) -> Option<(u32, i32)> {
        let month = caps.name("month")?.as_str().parse::<u32>().ok()?;
        let year = normalize_year(caps.name("year")?.as_str())?;
        Some((month, year))
    }

    fn from_day_list(caps: &Captures<'_>) -> Option<DateRange> {
        let (month, year) = Self::month_year(caps)?;
        let days = caps
            .name("days")?
            .as_str()
            .split(['.', '-', '/'])
            .map(|token| token.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;

        let first = *days.first()?;
        let last = *days.last()?;
        Self::build(year, month, Some(first), Some(Some(last)))
    }

    fn from_range(caps: &Captures<'_>) -> Option<DateRange> {
        let (month, year) = Self::month_year(caps)?;
        let start = parse_day(caps.name("start")?.as_str())?;
        let end = match caps.name("end") {
            Some(token) => Some(parse_day(token.as_str())?),
            None => None,
        };
        Self::build(year, month, start, end)
    }

    /// Assemble the range; an end day smaller than the start day rolls the
    /// end into the following month (one month only).
    fn build(
        year: i32,
        month: u32,
        start_day: Option<u32>,
        end_day: Option<Option<u32>>,
    ) -> Option<DateRange> {
        let start = EventDate::new(year, month, start_day);
        let end = end_day.map(|end_day| {
            let end_month = match (start_day, end_day) {
                (Some(first), Some(last)) if last < first => month + 1,
                _ => month,
            };
            EventDate::new(year, end_month, end_day)
        });
        DateRange::checked(start, end)
    }
}
