//! Rendering events into channel list lines.
//!
//! Lines use Telegram-style HTML markup. Each line reports how many rich-text
//! entities it consumes and its visible length, so the splitter can pack
//! lines without re-parsing the markup.

use crate::date::EventDate;
use crate::event::Event;
use crate::filter::GroupKey;

/// Entities every event line uses: the bold span and the title link.
pub const BASE_ENTITY_COST: usize = 2;

/// Icon shown for canceled events instead of the category icon.
pub const CANCELED_ICON: &str = "❌";
/// Icon shown when no category was found.
pub const UNKNOWN_CATEGORY_ICON: &str = "❓";
pub const DISCUSSION_ICON: &str = "💬";

/// One rendered line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedLine {
    /// Markup sent to the transport.
    pub text: String,
    /// Length of the text once markup is stripped, in UTF-16 code units.
    pub visible_length: usize,
    /// Rich-text entities the line consumes.
    pub entity_cost: usize,
}

impl FormattedLine {
    /// A line without markup.
    pub fn plain(text: impl Into<String>, entity_cost: usize) -> Self {
        let text = text.into();
        Self {
            visible_length: utf16_len(&text),
            text,
            entity_cost,
        }
    }
}

pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Escape text for HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn day_part(date: &EventDate) -> String {
    match date.day {
        Some(day) => format!("{:02}", day),
        None => "??".to_string(),
    }
}

/// Human-readable date column.
///
/// Ranges within one month collapse to `12-14/07/2024`; within one year to
/// `30/05-02/06/2024`.
pub fn format_dates(start: Option<EventDate>, end: Option<EventDate>, soon: bool) -> String {
    let Some(start) = start else {
        return if soon { "soon".to_string() } else { "?".to_string() };
    };
    match end {
        None => start.to_string(),
        Some(end) if end == start => start.to_string(),
        Some(end) if end.year == start.year && end.month == start.month => format!(
            "{}-{}/{:02}/{}",
            day_part(&start),
            day_part(&end),
            start.month,
            start.year
        ),
        Some(end) if end.year == start.year => format!(
            "{}/{:02}-{}/{:02}/{}",
            day_part(&start),
            start.month,
            day_part(&end),
            end.month,
            end.year
        ),
        Some(end) => format!("{}-{}", start, end),
    }
}

/// Renders events with links back to the channel.
#[derive(Debug, Clone)]
pub struct EventFormatter {
    channel_link_base: String,
    discussion_link_base: Option<String>,
}

impl EventFormatter {
    pub fn new(channel_link_base: impl Into<String>) -> Self {
        Self {
            channel_link_base: channel_link_base.into().trim_end_matches('/').to_string(),
            discussion_link_base: None,
        }
    }

    /// Link discussion posts under `base` when an event has one.
    pub fn with_discussion_link(mut self, base: impl Into<String>) -> Self {
        self.discussion_link_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    fn icon(event: &Event) -> &'static str {
        if event.canceled {
            CANCELED_ICON
        } else {
            event
                .category
                .map(|category| category.icon())
                .unwrap_or(UNKNOWN_CATEGORY_ICON)
        }
    }

    /// Render one event and report its entity cost.
    pub fn format(&self, event: &Event) -> FormattedLine {
        let icon = Self::icon(event);
        let region_icon = event.region.map(|region| region.icon()).unwrap_or("");
        let title = event.title.as_deref().unwrap_or("(untitled)");
        let dates = format_dates(event.start, event.end, event.soon);

        let mut text = format!(
            "{}{} <b><a href=\"{}/{}\">{}</a></b>",
            icon,
            region_icon,
            self.channel_link_base,
            event.message_id(),
            escape_html(title)
        );
        let mut visible = format!("{}{} {}", icon, region_icon, title);
        let mut entity_cost = BASE_ENTITY_COST;

        if let (Some(base), Some(post)) = (&self.discussion_link_base, event.discussion_post) {
            text.push_str(&format!(
                " <a href=\"{}/{}\">{}</a>",
                base, post.message_id, DISCUSSION_ICON
            ));
            visible.push(' ');
            visible.push_str(DISCUSSION_ICON);
            entity_cost += 1;
        }

        text.push_str(" • ");
        text.push_str(&dates);
        visible.push_str(" • ");
        visible.push_str(&dates);

        FormattedLine {
            text,
            visible_length: utf16_len(&visible),
            entity_cost,
        }
    }

    /// Bold section header for grouped listings.
    pub fn group_header(&self, label: &str) -> FormattedLine {
        FormattedLine {
            text: format!("<b>{}</b>", escape_html(label)),
            visible_length: utf16_len(label),
            entity_cost: 1,
        }
    }

    /// Render already sorted events, inserting a header whenever a group
    /// changes. A change at one level repeats the headers of deeper levels.
    pub fn format_list(&self, events: &[Event], group_by: &[GroupKey]) -> Vec<FormattedLine> {
        let mut lines = Vec::with_capacity(events.len());
        let mut current: Vec<String> = Vec::new();

        for event in events {
            let labels: Vec<String> = group_by.iter().map(|key| key.label(event)).collect();
            let changed_at = labels
                .iter()
                .zip(current.iter())
                .position(|(new, old)| new != old)
                .unwrap_or(current.len().min(labels.len()));
            if current.is_empty() || changed_at < labels.len() {
                for label in &labels[changed_at..] {
                    lines.push(self.group_header(label));
                }
            }
            current = labels;
            lines.push(self.format(event));
        }
        lines
    }
}
