//! Periodic re-render of pinned event lists.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::CatalogueError;
use crate::service::Catalogue;

/// A list whose rendered chunks changed since the previous run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshUpdate {
    pub tokens: Vec<String>,
    pub chunks: Vec<String>,
}

/// Owns the dirty flag's clearing side: renders the configured filters,
/// diffs against the last output and marks the cache clean.
pub struct RefreshJob {
    catalogue: Arc<Catalogue>,
    filters: Vec<Vec<String>>,
    last: HashMap<Vec<String>, Vec<String>>,
}

impl RefreshJob {
    pub fn new(catalogue: Arc<Catalogue>, filters: Vec<Vec<String>>) -> Self {
        Self {
            catalogue,
            filters,
            last: HashMap::new(),
        }
    }

    /// Render every filter once and return the lists that changed.
    ///
    /// The dirty generation is observed before rendering, so a mutation
    /// that lands mid-run leaves the cache dirty for the next run.
    pub async fn run_once(&mut self) -> Result<Vec<RefreshUpdate>, CatalogueError> {
        let cache = self.catalogue.cache().clone();
        let observed = cache.dirty_generation();
        let mut updates = Vec::new();

        for tokens in &self.filters {
            let chunks = self.catalogue.render(tokens.as_slice()).await?;
            if self.last.get(tokens) == Some(&chunks) {
                debug!("Event list {:?} unchanged", tokens);
                continue;
            }
            info!("Event list {:?} changed ({} chunks)", tokens, chunks.len());
            self.last.insert(tokens.clone(), chunks.clone());
            updates.push(RefreshUpdate {
                tokens: tokens.clone(),
                chunks,
            });
        }

        cache.mark_clean(observed);
        Ok(updates)
    }

    /// Run forever on a fixed period, handing changed lists to `on_update`.
    /// Store failures are logged and retried on the next tick.
    pub async fn run<F>(mut self, period: Duration, mut on_update: F)
    where
        F: FnMut(RefreshUpdate),
    {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(updates) => updates.into_iter().for_each(&mut on_update),
                Err(e) => warn!("Event list refresh failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use event_core::{EventKey, FixedClock, MemoryEventStore, MessageInput};

    use super::*;
    use crate::config::CatalogueConfig;

    fn job() -> (Arc<Catalogue>, RefreshJob) {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let catalogue = Arc::new(Catalogue::new(
            Arc::new(MemoryEventStore::new()),
            &CatalogueConfig::default(),
            Arc::new(FixedClock::new(today)),
        ));
        let filters = vec![vec!["i".to_string()], Vec::new()];
        (catalogue.clone(), RefreshJob::new(catalogue, filters))
    }

    async fn post(catalogue: &Catalogue, id: i64, text: &str) {
        let input = MessageInput::from_plain_text(text, Utc::now());
        catalogue
            .handle_message(EventKey::new(-100, id), &input, false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_run_reports_everything() {
        let (_, mut job) = job();
        let updates = job.run_once().await.unwrap();
        assert_eq!(updates.len(), 2);
        assert!(job.run_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_changed_lists_are_reported() {
        let (catalogue, mut job) = job();
        job.run_once().await.unwrap();

        post(&catalogue, 1, "Club night 20/07/2024 #france").await;
        assert!(catalogue.cache().is_dirty());

        let updates = job.run_once().await.unwrap();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].tokens.is_empty());
        assert!(updates[0].chunks[0].contains("Club night"));
        assert!(!catalogue.cache().is_dirty());
    }

    #[tokio::test]
    async fn test_reads_leave_dirty_flag_to_the_job() {
        let (catalogue, mut job) = job();
        post(&catalogue, 1, "Party 20/07/2024 #italia").await;
        catalogue.render(&["i"]).await.unwrap();
        assert!(catalogue.cache().is_dirty());

        job.run_once().await.unwrap();
        assert!(!catalogue.cache().is_dirty());
    }
}
