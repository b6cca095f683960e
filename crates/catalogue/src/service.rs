//! The catalogue service: parse, persist, notify and render.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use event_core::{
    compile, decide, Clock, DeletionReason, DiscussionRef, Event, EventFilter, EventFormatter,
    EventKey, EventListCache, EventStore, EventUpdater, FormattedLine, Intent, MessageInput,
    MessageSplitter, NoticeRef, RegionTable, Transition,
};

use crate::config::CatalogueConfig;
use crate::error::CatalogueError;

/// Result of handling one inbound or edited message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageOutcome {
    pub event: Event,
    /// `None` when the event is deleted.
    pub transition: Option<Transition>,
    /// What the transport should do about validity notices.
    pub intent: Intent,
}

/// Composes the event pipeline around an [`EventStore`].
pub struct Catalogue {
    store: Arc<dyn EventStore>,
    updater: EventUpdater,
    clock: Arc<dyn Clock>,
    cache: Arc<EventListCache>,
    formatter: EventFormatter,
    splitter: MessageSplitter,
    cache_ttl: Duration,
    empty_placeholder: String,
}

impl Catalogue {
    pub fn new(store: Arc<dyn EventStore>, config: &CatalogueConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_regions(store, config, clock, RegionTable::default())
    }

    /// Build a catalogue with a custom region table.
    pub fn with_regions(
        store: Arc<dyn EventStore>,
        config: &CatalogueConfig,
        clock: Arc<dyn Clock>,
        regions: RegionTable,
    ) -> Self {
        let mut formatter = EventFormatter::new(config.channel_link.clone());
        if let Some(base) = &config.discussion_link {
            formatter = formatter.with_discussion_link(base.clone());
        }

        Self {
            store,
            updater: EventUpdater::new(regions, clock.clone()),
            clock,
            cache: Arc::new(EventListCache::new()),
            formatter,
            splitter: MessageSplitter::new(config.max_message_length, config.max_entities),
            cache_ttl: config.cache_ttl,
            empty_placeholder: config.empty_placeholder.clone(),
        }
    }

    pub fn cache(&self) -> &Arc<EventListCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Parse a new or edited message into its event and persist it.
    ///
    /// Deleted events are kept current but produce no transition, no
    /// notification intent and no cache invalidation.
    pub async fn handle_message(
        &self,
        key: EventKey,
        input: &MessageInput,
        is_edit: bool,
    ) -> Result<MessageOutcome, CatalogueError> {
        self.apply(key, input, is_edit, false).await
    }

    /// Re-parse the stored text of an event, e.g. after a table change.
    pub async fn reparse(&self, key: EventKey) -> Result<MessageOutcome, CatalogueError> {
        let event = self.store.get(key).await?;
        let input = MessageInput {
            text: event.text.clone().unwrap_or_default(),
            entities: event.entities.clone(),
            media: None,
            date: event.message_date.unwrap_or_else(|| self.clock.now()),
            edit_date: None,
        };
        self.apply(key, &input, true, true).await
    }

    async fn apply(
        &self,
        key: EventKey,
        input: &MessageInput,
        is_edit: bool,
        force: bool,
    ) -> Result<MessageOutcome, CatalogueError> {
        let mut event = match self.store.load(key).await? {
            Some(event) => event,
            None => Event::new(key),
        };

        let transition = self.updater.update(&mut event, input, is_edit, force);
        self.store.save(&event).await?;

        let intent = match transition {
            Some(transition) => {
                self.cache.mark_dirty();
                decide(&transition, event.send_validity_notifications)
            }
            None => Intent::NoOp,
        };
        debug!("Handled {} (edit: {}, force: {}): {}", key, is_edit, force, intent.as_str());

        Ok(MessageOutcome {
            event,
            transition,
            intent,
        })
    }

    /// Render the event list for filter tokens into message chunks.
    ///
    /// Always returns at least one chunk: a placeholder when nothing matches.
    pub async fn render<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<String>, CatalogueError> {
        let filter = compile(tokens, self.clock.today()).with_region_order(self.updater.regions());
        let lines = self
            .cache
            .get_or_render(&filter.cache_key(), self.cache_ttl, || self.render_lines(&filter))
            .await?;

        if lines.is_empty() {
            return Ok(vec![self.empty_placeholder.clone()]);
        }
        Ok(self.splitter.split(&lines))
    }

    async fn render_lines(&self, filter: &EventFilter) -> Result<Vec<FormattedLine>, CatalogueError> {
        let mut events = self.store.find(filter).await?;
        filter.sort(&mut events);
        let lines = self.formatter.format_list(&events, &filter.group_by);
        info!(
            "Rendered event list {:?}: {} events, {} lines",
            filter.cache_key(),
            events.len(),
            lines.len()
        );
        Ok(lines)
    }

    /// Flag every cached list as stale after a change outside the parse path.
    pub fn mark_dirty(&self) {
        self.cache.mark_dirty();
    }

    /// Hide an event from listings.
    pub async fn delete_event(
        &self,
        key: EventKey,
        reason: DeletionReason,
    ) -> Result<Event, CatalogueError> {
        let event = self
            .modify(key, |event| event.mark_deleted(reason))
            .await?;
        info!("Deleted event {} ({:?})", key, reason);
        Ok(event)
    }

    /// Bring a deleted event back into listings.
    pub async fn restore_event(&self, key: EventKey) -> Result<Event, CatalogueError> {
        let event = self.modify(key, Event::restore).await?;
        info!("Restored event {}", key);
        Ok(event)
    }

    pub async fn set_notifications(
        &self,
        key: EventKey,
        enabled: bool,
    ) -> Result<Event, CatalogueError> {
        let event = self
            .modify(key, |event| event.set_send_validity_notifications(enabled))
            .await?;
        info!("Validity notifications for {} set to {}", key, enabled);
        Ok(event)
    }

    /// Link the discussion-group post mirroring an event.
    pub async fn set_discussion_post(
        &self,
        key: EventKey,
        post: DiscussionRef,
    ) -> Result<Event, CatalogueError> {
        self.modify(key, |event| event.discussion_post = Some(post)).await
    }

    /// Remember the notice sent for an event. Returns the notice it replaces,
    /// which the transport should delete.
    pub async fn record_notice(
        &self,
        key: EventKey,
        notice: NoticeRef,
    ) -> Result<Option<NoticeRef>, CatalogueError> {
        let mut replaced = None;
        self.modify(key, |event| replaced = event.record_notice(notice))
            .await?;
        Ok(replaced)
    }

    /// Forget and return the current notice so the transport can retract it.
    pub async fn take_notice(&self, key: EventKey) -> Result<Option<NoticeRef>, CatalogueError> {
        let mut taken = None;
        self.modify(key, |event| taken = event.take_notice()).await?;
        Ok(taken)
    }

    async fn modify<F>(&self, key: EventKey, change: F) -> Result<Event, CatalogueError>
    where
        F: FnOnce(&mut Event),
    {
        let mut event = self.store.get(key).await?;
        change(&mut event);
        self.store.save(&event).await?;
        self.cache.mark_dirty();
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use event_core::{FixedClock, MemoryEventStore, RegionId, StoreError};

    use super::*;

    fn catalogue_with(config: CatalogueConfig) -> Catalogue {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        Catalogue::new(
            Arc::new(MemoryEventStore::new()),
            &config,
            Arc::new(FixedClock::new(today)),
        )
    }

    fn catalogue() -> Catalogue {
        catalogue_with(CatalogueConfig {
            channel_link: "https://t.me/c/1234".to_string(),
            ..CatalogueConfig::default()
        })
    }

    fn input(text: &str) -> MessageInput {
        MessageInput::from_plain_text(text, Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap())
    }

    fn key(id: i64) -> EventKey {
        EventKey::new(-1001234, id)
    }

    #[tokio::test]
    async fn test_handle_new_message() {
        let catalogue = catalogue();
        let outcome = catalogue
            .handle_message(key(1), &input("Festival\n12-14/07/2024 #italia #freeparty"), false)
            .await
            .unwrap();

        assert_eq!(outcome.intent, Intent::NoOp);
        assert!(outcome.transition.is_some());
        assert!(catalogue.cache().is_dirty());
        assert_eq!(catalogue.store().get(key(1)).await.unwrap(), outcome.event);
    }

    #[tokio::test]
    async fn test_invalid_message_raises_notice() {
        let catalogue = catalogue();
        let outcome = catalogue
            .handle_message(key(1), &input("Party somewhere"), false)
            .await
            .unwrap();
        assert_eq!(outcome.intent, Intent::RaiseNewInvalid);

        catalogue.set_notifications(key(1), false).await.unwrap();
        let outcome = catalogue
            .handle_message(key(1), &input("Party somewhere, 20/06/2024"), false)
            .await
            .unwrap();
        assert_eq!(outcome.intent, Intent::NoOp);
    }

    #[tokio::test]
    async fn test_deleted_event_does_not_dirty_cache() {
        let catalogue = catalogue();
        catalogue
            .handle_message(key(1), &input("Party 20/07/2024"), false)
            .await
            .unwrap();
        catalogue.delete_event(key(1), DeletionReason::Duplicate).await.unwrap();

        let observed = catalogue.cache().dirty_generation();
        catalogue.cache().mark_clean(observed);

        let outcome = catalogue
            .handle_message(key(1), &input("Party 21/07/2024"), true)
            .await
            .unwrap();
        assert!(outcome.transition.is_none());
        assert_eq!(outcome.intent, Intent::NoOp);
        assert!(!catalogue.cache().is_dirty());
        assert_eq!(outcome.event.start.map(|d| d.day), Some(Some(21)));
    }

    #[tokio::test]
    async fn test_render_placeholder_when_empty() {
        let catalogue = catalogue_with(CatalogueConfig {
            empty_placeholder: "Nothing here".to_string(),
            ..CatalogueConfig::default()
        });
        let chunks = catalogue.render(&["i", "w"]).await.unwrap();
        assert_eq!(chunks, vec!["Nothing here".to_string()]);
    }

    #[tokio::test]
    async fn test_render_delete_and_restore() {
        let catalogue = catalogue();
        catalogue
            .handle_message(key(1), &input("Festival\n12-14/07/2024 #italia #freeparty"), false)
            .await
            .unwrap();
        catalogue
            .handle_message(key(2), &input("Club night 20/07/2024 #france #club"), false)
            .await
            .unwrap();

        let chunks = catalogue.render(&["f"]).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("https://t.me/c/1234/1"));
        assert!(!chunks[0].contains("Club night"));

        catalogue.delete_event(key(1), DeletionReason::NotAnEvent).await.unwrap();
        let chunks = catalogue.render(&["f"]).await.unwrap();
        assert_eq!(chunks, vec![CatalogueConfig::default().empty_placeholder]);

        catalogue.restore_event(key(1)).await.unwrap();
        let chunks = catalogue.render(&["F"]).await.unwrap();
        assert!(chunks[0].contains("Festival"));
    }

    #[tokio::test]
    async fn test_render_splits_by_entity_budget() {
        let catalogue = catalogue_with(CatalogueConfig {
            max_entities: 4,
            ..CatalogueConfig::default()
        });
        for id in 1..=3 {
            catalogue
                .handle_message(key(id), &input(&format!("Party {}\n2{}/07/2024", id, id)), false)
                .await
                .unwrap();
        }
        let chunks = catalogue.render(&["a"]).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].lines().count(), 2);
    }

    #[tokio::test]
    async fn test_grouped_render_has_headers() {
        let catalogue = catalogue();
        catalogue
            .handle_message(key(1), &input("A 12/07/2024 #sicilia"), false)
            .await
            .unwrap();
        catalogue
            .handle_message(key(2), &input("B 13/07/2024 #francia"), false)
            .await
            .unwrap();
        let chunks = catalogue.render(&["gr"]).await.unwrap();
        let lines: Vec<&str> = chunks[0].lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "<b>Sicily</b>");
        assert_eq!(lines[2], "<b>France</b>");
    }

    #[tokio::test]
    async fn test_grouping_order_is_not_shared_through_cache() {
        let catalogue = catalogue();
        catalogue
            .handle_message(key(1), &input("A 12/07/2024 #sicilia"), false)
            .await
            .unwrap();
        catalogue
            .handle_message(key(2), &input("B 10/08/2024 #francia"), false)
            .await
            .unwrap();
        let observed = catalogue.cache().dirty_generation();
        catalogue.cache().mark_clean(observed);

        let by_region = catalogue.render(&["gr", "gm"]).await.unwrap();
        let by_month = catalogue.render(&["gm", "gr"]).await.unwrap();
        assert!(by_region[0].starts_with("<b>Sicily</b>\n<b>July 2024</b>"));
        assert!(by_month[0].starts_with("<b>July 2024</b>\n<b>Sicily</b>"));
        assert_eq!(catalogue.cache().len(), 2);

        // Warm cache keeps each order.
        assert_eq!(catalogue.render(&["gm", "gr"]).await.unwrap(), by_month);
        assert_eq!(catalogue.render(&["gr", "gm"]).await.unwrap(), by_region);
    }

    #[tokio::test]
    async fn test_region_groups_follow_custom_table() {
        let regions = RegionTable::try_new(vec![
            (RegionId::France, vec!["francia".to_string()]),
            (RegionId::Sicily, vec!["sicilia".to_string()]),
        ])
        .unwrap();
        let catalogue = Catalogue::with_regions(
            Arc::new(MemoryEventStore::new()),
            &CatalogueConfig::default(),
            Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())),
            regions,
        );
        catalogue
            .handle_message(key(1), &input("A 12/07/2024 #sicilia"), false)
            .await
            .unwrap();
        catalogue
            .handle_message(key(2), &input("B 13/07/2024 #francia"), false)
            .await
            .unwrap();

        let chunks = catalogue.render(&["gr"]).await.unwrap();
        let lines: Vec<&str> = chunks[0].lines().collect();
        assert_eq!(lines[0], "<b>France</b>");
        assert_eq!(lines[2], "<b>Sicily</b>");
    }

    #[tokio::test]
    async fn test_discussion_link_and_notices() {
        let catalogue = catalogue_with(CatalogueConfig {
            discussion_link: Some("https://t.me/c/77".to_string()),
            ..CatalogueConfig::default()
        });
        catalogue
            .handle_message(key(1), &input("Party 20/07/2024"), false)
            .await
            .unwrap();
        catalogue
            .set_discussion_post(key(1), DiscussionRef { chat_id: 77, message_id: 5 })
            .await
            .unwrap();
        let chunks = catalogue.render::<&str>(&[]).await.unwrap();
        assert!(chunks[0].contains("https://t.me/c/77/5"));

        let first = NoticeRef { chat_id: 1, message_id: 10 };
        let second = NoticeRef { chat_id: 1, message_id: 11 };
        assert_eq!(catalogue.record_notice(key(1), first).await.unwrap(), None);
        assert_eq!(catalogue.record_notice(key(1), second).await.unwrap(), Some(first));
        assert_eq!(catalogue.take_notice(key(1)).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_reparse_uses_stored_text() {
        let catalogue = catalogue();
        catalogue
            .handle_message(key(1), &input("Party 20/07/2024 #italia"), false)
            .await
            .unwrap();
        let outcome = catalogue.reparse(key(1)).await.unwrap();
        assert_eq!(outcome.event.region, Some(event_core::RegionId::Italy));
        assert!(outcome.transition.is_some_and(|t| t.is_edit));
    }

    #[tokio::test]
    async fn test_missing_event_is_not_found() {
        let catalogue = catalogue();
        let result = catalogue.restore_event(key(9)).await;
        assert!(matches!(
            result,
            Err(CatalogueError::Store(StoreError::NotFound(_)))
        ));
    }
}
