//! Memoized event list renders.
//!
//! Entries expire after a TTL or when any event changes. Staleness is
//! tracked with two generation counters instead of a single boolean:
//! every mutation bumps the dirty generation, and the periodic refresh job
//! marks clean only the generation it observed before rendering. A mutation
//! that lands during that render therefore keeps the cache dirty.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::formatting::FormattedLine;

#[derive(Debug, Clone)]
struct CacheEntry {
    saved_at: Instant,
    generation: u64,
    lines: Vec<FormattedLine>,
}

/// Process-wide cache of rendered line lists, keyed by filter cache key.
#[derive(Debug, Default)]
pub struct EventListCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    dirty_generation: AtomicU64,
    clean_generation: AtomicU64,
}

impl EventListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that some event changed. Every key misses until the refresh
    /// job marks the cache clean again.
    pub fn mark_dirty(&self) {
        let generation = self.dirty_generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Event list cache marked dirty (generation {})", generation);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_generation.load(Ordering::SeqCst) > self.clean_generation.load(Ordering::SeqCst)
    }

    /// Current dirty generation. Observe it before rendering and pass it to
    /// [`store`](Self::store) and [`mark_clean`](Self::mark_clean).
    pub fn dirty_generation(&self) -> u64 {
        self.dirty_generation.load(Ordering::SeqCst)
    }

    /// Clear the dirty flag up to `observed`. Later mutations stay pending.
    pub fn mark_clean(&self, observed: u64) {
        let previous = self.clean_generation.fetch_max(observed, Ordering::SeqCst);
        if observed > previous {
            debug!("Event list cache clean up to generation {}", observed);
        }
    }

    /// Cached lines for `key`, if fresh.
    pub fn lookup(&self, key: &str, ttl: Duration) -> Option<Vec<FormattedLine>> {
        if self.is_dirty() {
            return None;
        }
        let current = self.dirty_generation();
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.generation != current || entry.saved_at.elapsed() >= ttl {
            return None;
        }
        Some(entry.lines.clone())
    }

    /// Save lines rendered after observing `generation`.
    pub fn store(&self, key: &str, generation: u64, lines: Vec<FormattedLine>) {
        let mut entries = self.entries.lock();
        entries.insert(
            key.to_string(),
            CacheEntry {
                saved_at: Instant::now(),
                generation,
                lines,
            },
        );
    }

    /// Return cached lines or render, store and return fresh ones.
    ///
    /// The lock is not held while `render` runs. Reads never clear the
    /// dirty flag.
    pub async fn get_or_render<E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        render: F,
    ) -> Result<Vec<FormattedLine>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<FormattedLine>, E>>,
    {
        let generation = self.dirty_generation();
        if let Some(lines) = self.lookup(key, ttl) {
            debug!("Event list cache hit for {:?}", key);
            return Ok(lines);
        }
        debug!("Event list cache miss for {:?}", key);
        let lines = render().await?;
        self.store(key, generation, lines.clone());
        Ok(lines)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
