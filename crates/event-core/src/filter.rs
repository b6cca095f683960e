//! Compiling moderator filter tokens into event predicates.
//!
//! Tokens are short, case-insensitive and order-independent:
//!
//! | Axis | Tokens |
//! |---|---|
//! | region | `i` (Italy and sub-regions), `ni` (outside Italy) |
//! | category | `l`/`nf` (not a free party), `f` (free party) |
//! | time | `w`, `w2`, `mfn`, `s`, `a`; default is this month and next |
//! | grouping | `gr` (region), `gm` (month) |
//!
//! Within the region, category and time axes the token listed later wins,
//! regardless of input order. Grouping tokens apply in the order given, and
//! regions group in [`RegionTable`] order.

use std::cmp::Ordering;

use chrono::{Datelike, Days, Month, Months, NaiveDate};
use tracing::debug;

use crate::date::month_end;
use crate::event::Event;
use crate::hashtags::Category;
use crate::regions::{RegionId, RegionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RegionFilter {
    Italy,
    NotItaly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CategoryFilter {
    NonFree,
    FreeParty,
}

/// Time axis, declared in increasing precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TimeWindow {
    /// This month and next month.
    #[default]
    Default,
    /// Current ISO week, Monday to Sunday.
    CurrentWeek,
    /// Current and next ISO week.
    TwoWeeks,
    /// From today to the end of next month.
    MonthFromToday,
    /// Only events flagged as coming soon.
    Soon,
    /// From the start of this month, unbounded.
    FromThisMonth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Region,
    Month,
}

impl GroupKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Region => "gr",
            Self::Month => "gm",
        }
    }

    /// Header text of the group `event` belongs to.
    pub fn label(&self, event: &Event) -> String {
        match self {
            Self::Region => event
                .region
                .map(|region| region.label().to_string())
                .unwrap_or_else(|| "Other".to_string()),
            Self::Month => match event.start {
                Some(start) => {
                    let name = u8::try_from(start.month)
                        .ok()
                        .and_then(|m| Month::try_from(m).ok())
                        .map(|m| m.name())
                        .unwrap_or("?");
                    format!("{} {}", name, start.year)
                }
                None => "Undated".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKey {
    Region,
    Month,
    StartDate,
    MessageId,
}

impl From<GroupKey> for OrderKey {
    fn from(key: GroupKey) -> Self {
        match key {
            GroupKey::Region => Self::Region,
            GroupKey::Month => Self::Month,
        }
    }
}

/// Compare optional keys with `None` after every value.
fn missing_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl OrderKey {
    fn compare(&self, a: &Event, b: &Event, region_order: &[RegionId]) -> Ordering {
        match self {
            Self::Region => {
                // Regions missing from the table follow the listed ones.
                let rank = |e: &Event| {
                    e.region.map(|region| {
                        let position = region_order.iter().position(|r| *r == region);
                        (position.unwrap_or(region_order.len()), region)
                    })
                };
                missing_last(rank(a), rank(b))
            }
            Self::Month => {
                let key = |e: &Event| e.start.map(|d| (d.year, d.month));
                missing_last(key(a), key(b))
            }
            Self::StartDate => {
                let key = |e: &Event| e.start.map(|d| d.sort_key());
                missing_last(key(a), key(b))
            }
            Self::MessageId => a.message_id().cmp(&b.message_id()),
        }
    }
}

/// A single condition over event fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    NotDeleted,
    Region(RegionFilter),
    Category(CategoryFilter),
    /// The event's day span intersects `[from, to]`; `to == None` is unbounded.
    Overlaps { from: NaiveDate, to: Option<NaiveDate> },
    Soon,
}

impl Predicate {
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Self::NotDeleted => !event.deleted,
            Self::Region(RegionFilter::Italy) => event.region.is_some_and(|r| r.is_italian()),
            Self::Region(RegionFilter::NotItaly) => event.region.is_some_and(|r| !r.is_italian()),
            Self::Category(CategoryFilter::FreeParty) => event.category == Some(Category::FreeParty),
            Self::Category(CategoryFilter::NonFree) => {
                matches!(event.category, Some(Category::Legal | Category::Other))
            }
            Self::Overlaps { from, to } => match event.span() {
                Some((start, end)) => end >= *from && to.map_or(true, |to| start <= to),
                None => false,
            },
            Self::Soon => event.soon,
        }
    }
}

enum Token {
    Region(RegionFilter),
    Category(CategoryFilter),
    Time(TimeWindow),
    Group(GroupKey),
}

fn parse_token(token: &str) -> Option<Token> {
    let token = match token {
        "i" => Token::Region(RegionFilter::Italy),
        "ni" => Token::Region(RegionFilter::NotItaly),
        "l" | "nf" => Token::Category(CategoryFilter::NonFree),
        "f" => Token::Category(CategoryFilter::FreeParty),
        "w" => Token::Time(TimeWindow::CurrentWeek),
        "w2" => Token::Time(TimeWindow::TwoWeeks),
        "mfn" => Token::Time(TimeWindow::MonthFromToday),
        "s" => Token::Time(TimeWindow::Soon),
        "a" => Token::Time(TimeWindow::FromThisMonth),
        "gr" => Token::Group(GroupKey::Region),
        "gm" => Token::Group(GroupKey::Month),
        _ => return None,
    };
    Some(token)
}

/// Compiled filter: predicates, ordering and grouping.
#[derive(Debug, Clone)]
pub struct EventFilter {
    tokens: Vec<String>,
    region_order: Vec<RegionId>,
    pub region: Option<RegionFilter>,
    pub category: Option<CategoryFilter>,
    pub time: TimeWindow,
    pub predicates: Vec<Predicate>,
    pub order_by: Vec<OrderKey>,
    pub group_by: Vec<GroupKey>,
}

impl EventFilter {
    /// Whether the event passes every predicate.
    pub fn matches(&self, event: &Event) -> bool {
        self.predicates.iter().all(|predicate| predicate.matches(event))
    }

    /// Group regions in the order of `table` instead of declaration order.
    pub fn with_region_order(mut self, table: &RegionTable) -> Self {
        self.region_order = table.regions().collect();
        self
    }

    /// Sort events by the compiled ordering.
    pub fn sort(&self, events: &mut [Event]) {
        events.sort_by(|a, b| {
            self.order_by.iter().fold(Ordering::Equal, |ord, key| {
                ord.then_with(|| key.compare(a, b, &self.region_order))
            })
        });
    }

    /// Selection tokens sorted and joined with `+`, then `/` and the
    /// grouping tokens in the order they were given.
    pub fn cache_key(&self) -> String {
        let selection = self.tokens.join("+");
        if self.group_by.is_empty() {
            return selection;
        }
        let grouping: Vec<&str> = self.group_by.iter().map(GroupKey::as_str).collect();
        format!("{}/{}", selection, grouping.join("+"))
    }

    /// Recognized selection tokens, lowercased and sorted.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn end_of_next_month(date: NaiveDate) -> NaiveDate {
    start_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(month_end)
        .unwrap_or(NaiveDate::MAX)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

fn days_after(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

/// Compile filter tokens relative to `today`. Unknown tokens are ignored.
pub fn compile<S: AsRef<str>>(tokens: &[S], today: NaiveDate) -> EventFilter {
    let mut recognized = Vec::new();
    let mut region = None;
    let mut category = None;
    let mut time = TimeWindow::Default;
    let mut group_by: Vec<GroupKey> = Vec::new();

    for raw in tokens {
        let token = raw.as_ref().trim().to_lowercase();
        let Some(parsed) = parse_token(&token) else {
            if !token.is_empty() {
                debug!("Ignoring unknown filter token {:?}", token);
            }
            continue;
        };
        match parsed {
            Token::Region(value) => region = region.max(Some(value)),
            Token::Category(value) => category = category.max(Some(value)),
            Token::Time(value) => time = time.max(value),
            Token::Group(key) => {
                if !group_by.contains(&key) {
                    group_by.push(key);
                }
                continue;
            }
        }
        recognized.push(token);
    }
    recognized.sort();
    recognized.dedup();

    let mut predicates = vec![Predicate::NotDeleted];
    if let Some(region) = region {
        predicates.push(Predicate::Region(region));
    }
    if let Some(category) = category {
        predicates.push(Predicate::Category(category));
    }
    predicates.push(match time {
        TimeWindow::Default => Predicate::Overlaps {
            from: start_of_month(today),
            to: Some(end_of_next_month(today)),
        },
        TimeWindow::CurrentWeek => {
            let monday = week_start(today);
            Predicate::Overlaps {
                from: monday,
                to: Some(days_after(monday, 6)),
            }
        }
        TimeWindow::TwoWeeks => {
            let monday = week_start(today);
            Predicate::Overlaps {
                from: monday,
                to: Some(days_after(monday, 13)),
            }
        }
        TimeWindow::MonthFromToday => Predicate::Overlaps {
            from: today,
            to: Some(end_of_next_month(today)),
        },
        TimeWindow::Soon => Predicate::Soon,
        TimeWindow::FromThisMonth => Predicate::Overlaps {
            from: start_of_month(today),
            to: None,
        },
    });

    let mut order_by: Vec<OrderKey> = group_by.iter().copied().map(OrderKey::from).collect();
    order_by.push(OrderKey::StartDate);
    order_by.push(OrderKey::MessageId);

    EventFilter {
        tokens: recognized,
        region_order: Vec::new(),
        region,
        category,
        time,
        predicates,
        order_by,
        group_by,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::EventDate;
    use crate::event::{DeletionReason, EventKey};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // Wednesday.
    fn today() -> NaiveDate {
        day(2024, 7, 17)
    }

    fn event(id: i64, start: Option<EventDate>) -> Event {
        let mut event = Event::new(EventKey::new(-100, id));
        event.start = start;
        event
    }

    fn on(id: i64, y: i32, m: u32, d: u32) -> Event {
        event(id, Some(EventDate::new(y, m, Some(d))))
    }

    #[test]
    fn test_default_window() {
        let filter = compile::<&str>(&[], today());
        assert_eq!(filter.time, TimeWindow::Default);
        assert!(filter.matches(&on(1, 2024, 7, 1)));
        assert!(filter.matches(&on(2, 2024, 8, 31)));
        assert!(!filter.matches(&on(3, 2024, 9, 1)));
        assert!(!filter.matches(&on(4, 2024, 6, 30)));
        assert!(!filter.matches(&event(5, None)));
    }

    #[test]
    fn test_week_windows() {
        let week = compile(&["w"], today());
        assert!(week.matches(&on(1, 2024, 7, 15)));
        assert!(week.matches(&on(2, 2024, 7, 21)));
        assert!(!week.matches(&on(3, 2024, 7, 22)));
        assert!(!week.matches(&on(4, 2024, 7, 14)));

        let two_weeks = compile(&["W2"], today());
        assert!(two_weeks.matches(&on(3, 2024, 7, 28)));
        assert!(!two_weeks.matches(&on(4, 2024, 7, 29)));
    }

    #[test]
    fn test_range_overlapping_window_start() {
        let week = compile(&["w"], today());
        let mut event = on(1, 2024, 7, 12);
        event.end = Some(EventDate::new(2024, 7, Some(15)));
        assert!(week.matches(&event));
    }

    #[test]
    fn test_month_from_today_includes_undated_days() {
        let filter = compile(&["mfn"], today());
        assert!(!filter.matches(&on(1, 2024, 7, 16)));
        assert!(filter.matches(&on(2, 2024, 7, 17)));
        assert!(filter.matches(&event(3, Some(EventDate::month_only(2024, 7)))));
        assert!(filter.matches(&on(4, 2024, 8, 20)));
        assert!(!filter.matches(&on(5, 2024, 9, 1)));
    }

    #[test]
    fn test_all_from_this_month() {
        let filter = compile(&["a"], today());
        assert!(filter.matches(&on(1, 2030, 1, 1)));
        assert!(!filter.matches(&on(2, 2024, 6, 30)));
    }

    #[test]
    fn test_soon() {
        let filter = compile(&["s"], today());
        let mut soon = event(1, None);
        soon.soon = true;
        assert!(filter.matches(&soon));
        assert!(!filter.matches(&on(2, 2024, 7, 20)));
    }

    #[test]
    fn test_time_precedence_ignores_input_order() {
        assert_eq!(compile(&["a", "w"], today()).time, TimeWindow::FromThisMonth);
        assert_eq!(compile(&["w", "a"], today()).time, TimeWindow::FromThisMonth);
        assert_eq!(compile(&["s", "mfn"], today()).time, TimeWindow::Soon);
        assert_eq!(compile(&["w2", "w"], today()).time, TimeWindow::TwoWeeks);
    }

    #[test]
    fn test_region_and_category_axes() {
        let filter = compile(&["I", "f"], today());
        let mut event = on(1, 2024, 7, 20);
        event.region = Some(RegionId::Sicily);
        event.category = Some(Category::FreeParty);
        assert!(filter.matches(&event));

        event.region = Some(RegionId::France);
        assert!(!filter.matches(&event));
        assert!(compile(&["ni"], today()).matches(&event));

        event.category = Some(Category::Legal);
        assert!(compile(&["nf"], today()).matches(&event));
        assert!(compile(&["l"], today()).matches(&event));
        assert!(!compile(&["f"], today()).matches(&event));

        assert_eq!(compile(&["ni", "i"], today()).region, Some(RegionFilter::NotItaly));
        assert_eq!(compile(&["f", "l"], today()).category, Some(CategoryFilter::FreeParty));
    }

    #[test]
    fn test_missing_region_matches_neither_region_token() {
        let event = on(1, 2024, 7, 20);
        assert!(!compile(&["i"], today()).matches(&event));
        assert!(!compile(&["ni"], today()).matches(&event));
    }

    #[test]
    fn test_deleted_events_never_match() {
        let mut event = on(1, 2024, 7, 20);
        event.mark_deleted(DeletionReason::Other);
        assert!(!compile(&["a"], today()).matches(&event));
    }

    #[test]
    fn test_unknown_tokens_and_cache_key() {
        let filter = compile(&["W", "zz", "i", "w", ""], today());
        assert_eq!(filter.cache_key(), "i+w");
        assert_eq!(compile::<&str>(&[], today()).cache_key(), "");
    }

    #[test]
    fn test_cache_key_keeps_grouping_order() {
        let by_region = compile(&["w", "gr", "I", "gm"], today());
        let by_month = compile(&["gm", "i", "gr", "w", "gm"], today());
        assert_eq!(by_region.cache_key(), "i+w/gr+gm");
        assert_eq!(by_month.cache_key(), "i+w/gm+gr");
        assert_eq!(compile(&["gr"], today()).cache_key(), "/gr");
        assert_eq!(by_month.tokens(), ["i".to_string(), "w".to_string()]);
    }

    #[test]
    fn test_region_grouping_follows_table_order() {
        let table = RegionTable::try_new(vec![
            (RegionId::France, vec!["francia".to_string()]),
            (RegionId::Sicily, vec!["sicilia".to_string()]),
        ])
        .unwrap();
        let mut sicily = on(1, 2024, 7, 1);
        sicily.region = Some(RegionId::Sicily);
        let mut france = on(2, 2024, 7, 20);
        france.region = Some(RegionId::France);
        let mut spain = on(3, 2024, 7, 2);
        spain.region = Some(RegionId::Spain);

        let mut events = vec![sicily.clone(), spain.clone(), france.clone()];
        compile(&["gr"], today()).sort(&mut events);
        let ids: Vec<i64> = events.iter().map(|e| e.message_id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let filter = compile(&["gr"], today()).with_region_order(&table);
        let mut events = vec![sicily, spain, france];
        filter.sort(&mut events);
        let ids: Vec<i64> = events.iter().map(|e| e.message_id()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_ordering_and_grouping() {
        let filter = compile(&["gr", "gm"], today());
        assert_eq!(filter.group_by, vec![GroupKey::Region, GroupKey::Month]);
        assert_eq!(
            filter.order_by,
            vec![
                OrderKey::Region,
                OrderKey::Month,
                OrderKey::StartDate,
                OrderKey::MessageId
            ]
        );

        let mut france = on(1, 2024, 7, 20);
        france.region = Some(RegionId::France);
        let mut north = on(2, 2024, 8, 1);
        north.region = Some(RegionId::NorthItaly);
        let mut north_early = on(3, 2024, 7, 30);
        north_early.region = Some(RegionId::NorthItaly);
        let nowhere = on(4, 2024, 7, 1);

        let mut events = vec![france, north, nowhere, north_early];
        filter.sort(&mut events);
        let ids: Vec<i64> = events.iter().map(|e| e.message_id()).collect();
        assert_eq!(ids, vec![3, 2, 1, 4]);
    }

    #[test]
    fn test_unknown_day_sorts_first_in_month() {
        let filter = compile::<&str>(&[], today());
        let mut events = vec![on(1, 2024, 7, 1), event(2, Some(EventDate::month_only(2024, 7)))];
        filter.sort(&mut events);
        assert_eq!(events[0].message_id(), 2);
    }

    #[test]
    fn test_group_labels() {
        let mut event = on(1, 2024, 7, 20);
        assert_eq!(GroupKey::Month.label(&event), "July 2024");
        assert_eq!(GroupKey::Region.label(&event), "Other");
        event.region = Some(RegionId::Sardinia);
        assert_eq!(GroupKey::Region.label(&event), "Sardinia");
        event.start = None;
        assert_eq!(GroupKey::Month.label(&event), "Undated");
    }
}
