//! Configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use event_core::splitter::{DEFAULT_MAX_ENTITIES, DEFAULT_MAX_LENGTH};

use crate::error::CatalogueError;

const DEFAULT_SQLITE_PATH: &str = "./data/events.db";
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_CHANNEL_LINK: &str = "https://t.me/c/0";
const DEFAULT_EMPTY_PLACEHOLDER: &str = "No events found";

/// Catalogue service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogueConfig {
    /// SQLite database URL.
    pub database_url: String,
    /// How long a rendered list stays fresh.
    pub cache_ttl: Duration,
    /// Chunk length limit in UTF-16 code units.
    pub max_message_length: usize,
    /// Rich-text entities allowed per chunk.
    pub max_entities: usize,
    /// Base URL for event links.
    pub channel_link: String,
    /// Base URL for discussion-thread links.
    pub discussion_link: Option<String>,
    /// Text of the single chunk returned when nothing matches.
    pub empty_placeholder: String,
    /// Token sets the refresh job keeps rendered.
    pub refresh_filters: Vec<Vec<String>>,
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            database_url: sqlite_url(DEFAULT_SQLITE_PATH),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            max_message_length: DEFAULT_MAX_LENGTH,
            max_entities: DEFAULT_MAX_ENTITIES,
            channel_link: DEFAULT_CHANNEL_LINK.to_string(),
            discussion_link: None,
            empty_placeholder: DEFAULT_EMPTY_PLACEHOLDER.to_string(),
            refresh_filters: Vec::new(),
        }
    }
}

impl CatalogueConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `SQLITE_PATH` | SQLite path or `sqlite:` URL | `./data/events.db` |
    /// | `EVENTS_CACHE_TTL_SECS` | Rendered list TTL | `300` |
    /// | `EVENTS_MAX_MESSAGE_LENGTH` | Chunk length limit | `4096` |
    /// | `EVENTS_MAX_ENTITIES` | Entities per chunk | `100` |
    /// | `EVENTS_CHANNEL_LINK` | Event link base URL | `https://t.me/c/0` |
    /// | `EVENTS_DISCUSSION_LINK` | Discussion link base URL | (none) |
    /// | `EVENTS_EMPTY_PLACEHOLDER` | Text when nothing matches | `No events found` |
    /// | `EVENTS_REFRESH_FILTERS` | `;`-separated token sets, e.g. `i w;ni` | (none) |
    pub fn from_env() -> Result<Self, CatalogueError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CatalogueError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = var("SQLITE_PATH")
            .map(|path| sqlite_url(&path))
            .unwrap_or(defaults.database_url);

        let cache_ttl = match var("EVENTS_CACHE_TTL_SECS") {
            Some(raw) => Duration::from_secs(parse_number("EVENTS_CACHE_TTL_SECS", &raw)?),
            None => defaults.cache_ttl,
        };
        let max_message_length = match var("EVENTS_MAX_MESSAGE_LENGTH") {
            Some(raw) => parse_number("EVENTS_MAX_MESSAGE_LENGTH", &raw)?,
            None => defaults.max_message_length,
        };
        let max_entities = match var("EVENTS_MAX_ENTITIES") {
            Some(raw) => parse_number("EVENTS_MAX_ENTITIES", &raw)?,
            None => defaults.max_entities,
        };

        let channel_link = var("EVENTS_CHANNEL_LINK").unwrap_or(defaults.channel_link);
        let discussion_link = var("EVENTS_DISCUSSION_LINK");
        let empty_placeholder =
            var("EVENTS_EMPTY_PLACEHOLDER").unwrap_or(defaults.empty_placeholder);
        let refresh_filters = var("EVENTS_REFRESH_FILTERS")
            .map(|raw| parse_filter_sets(&raw))
            .unwrap_or_default();

        Ok(Self {
            database_url,
            cache_ttl,
            max_message_length,
            max_entities,
            channel_link,
            discussion_link,
            empty_placeholder,
            refresh_filters,
        })
    }
}

/// Turn a bare path into a SQLite URL that creates the file on demand.
pub fn sqlite_url(path: &str) -> String {
    if path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite:{}?mode=rwc", path)
    }
}

/// Split `"i w; ni"` into token sets. A lone `-` stands for the default
/// filter with no tokens.
pub fn parse_filter_sets(raw: &str) -> Vec<Vec<String>> {
    raw.split(';')
        .map(str::trim)
        .filter(|set| !set.is_empty())
        .map(|set| {
            if set == "-" {
                Vec::new()
            } else {
                set.split_whitespace().map(str::to_string).collect()
            }
        })
        .collect()
}

fn parse_number<T: FromStr>(name: &str, raw: &str) -> Result<T, CatalogueError> {
    raw.parse()
        .map_err(|_| CatalogueError::Configuration(format!("{} must be a number, got {:?}", name, raw)))
}
