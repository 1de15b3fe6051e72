//! Update Dispatch
//!
//! Routes each decoded topic update into the cache and, for live topics,
//! out to subscribers.
//!
//! | Topic kind | Cache write       | Broadcast |
//! |------------|-------------------|-----------|
//! | Metadata   | replace slot      | no        |
//! | Live       | replace + stamp   | yes       |
//! | Unknown    | none              | no        |

use std::sync::Arc;

use chrono::Utc;

use crate::application::ports::UpdatePublisher;
use crate::domain::cache::SharedCacheStore;
use crate::domain::streaming::LiveUpdate;
use crate::domain::topic::{TopicKind, TopicUpdate};

/// Result of dispatching one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Metadata slot replaced.
    Cached,
    /// Live slot replaced and the update handed to the publisher.
    Published {
        /// Subscribers that accepted the update.
        delivered: usize,
    },
    /// Topic is not relayed.
    Ignored,
}

/// Applies decoded updates to the cache and publishes live ones.
pub struct UpdateDispatcher {
    cache: SharedCacheStore,
    publisher: Arc<dyn UpdatePublisher>,
}

impl UpdateDispatcher {
    /// Create a dispatcher writing to `cache` and publishing through `publisher`.
    #[must_use]
    pub fn new(cache: SharedCacheStore, publisher: Arc<dyn UpdatePublisher>) -> Self {
        Self { cache, publisher }
    }

    /// Dispatch one decoded update.
    pub fn dispatch(&self, update: TopicUpdate) -> DispatchOutcome {
        let TopicUpdate { topic, payload } = update;

        match topic.kind() {
            TopicKind::Metadata(slot) => {
                self.cache.write_metadata(slot, payload);
                tracing::debug!(topic = %topic, "Metadata cached");
                DispatchOutcome::Cached
            }
            TopicKind::Live(slot) => {
                let now = Utc::now();
                self.cache.write_live(slot, payload.clone(), now);

                let envelope = LiveUpdate {
                    target: topic,
                    data: payload,
                    timestamp: now,
                };
                let delivered = self.publisher.publish(&envelope);
                tracing::trace!(topic = %envelope.target, delivered, "Live update published");
                DispatchOutcome::Published { delivered }
            }
            TopicKind::Unknown => {
                tracing::debug!(topic = %topic, "Ignoring update for unknown topic");
                DispatchOutcome::Ignored
            }
        }
    }
}

impl std::fmt::Debug for UpdateDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateDispatcher")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::always;
    use serde_json::json;

    use super::*;
    use crate::application::ports::MockUpdatePublisher;
    use crate::domain::cache::CacheStore;
    use crate::domain::topic::Topic;

    fn dispatcher_with(publisher: MockUpdatePublisher) -> (UpdateDispatcher, SharedCacheStore) {
        let cache = Arc::new(CacheStore::new());
        let dispatcher = UpdateDispatcher::new(Arc::clone(&cache), Arc::new(publisher));
        (dispatcher, cache)
    }

    #[test]
    fn metadata_is_cached_without_publishing() {
        let mut publisher = MockUpdatePublisher::new();
        publisher.expect_publish().never();
        let (dispatcher, cache) = dispatcher_with(publisher);

        let outcome = dispatcher.dispatch(TopicUpdate::new(
            Topic::REFERENCE_DETAILS,
            json!({"products": ["gold"]}),
        ));

        assert_eq!(outcome, DispatchOutcome::Cached);
        assert_eq!(
            cache.snapshot().reference_details,
            json!({"products": ["gold"]})
        );
        assert!(cache.last_live_update().is_none());
    }

    #[test]
    fn coin_update_is_cached_and_published() {
        let mut publisher = MockUpdatePublisher::new();
        publisher
            .expect_publish()
            .withf(|update| {
                update.target.as_str() == "workerPublishCoin"
                    && update.data == json!({"BTC": 50000})
            })
            .times(1)
            .return_const(2_usize);
        let (dispatcher, cache) = dispatcher_with(publisher);

        let before = Utc::now();
        let outcome = dispatcher.dispatch(TopicUpdate::new(
            Topic::COIN_RATES,
            json!({"BTC": 50000}),
        ));

        assert_eq!(outcome, DispatchOutcome::Published { delivered: 2 });
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.worker_publish_coin, json!({"BTC": 50000}));
        assert!(snapshot.coin_last_update.unwrap() >= before);
    }

    #[test]
    fn rates_update_fills_live_rates_slot() {
        let mut publisher = MockUpdatePublisher::new();
        publisher.expect_publish().with(always()).return_const(0_usize);
        let (dispatcher, cache) = dispatcher_with(publisher);

        dispatcher.dispatch(TopicUpdate::new(Topic::LIVE_RATES, json!([{"gold": 1}])));

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.live_rates, json!([{"gold": 1}]));
        assert!(snapshot.last_update.is_some());
    }

    #[test]
    fn published_timestamp_matches_cache_stamp() {
        let cache = Arc::new(CacheStore::new());
        let mut publisher = MockUpdatePublisher::new();
        let observed = Arc::new(parking_lot::Mutex::new(None));
        let sink = Arc::clone(&observed);
        publisher.expect_publish().returning(move |update| {
            *sink.lock() = Some(update.timestamp);
            1
        });
        let dispatcher = UpdateDispatcher::new(Arc::clone(&cache), Arc::new(publisher));

        dispatcher.dispatch(TopicUpdate::new(Topic::LIVE_RATES, json!({})));

        assert_eq!(*observed.lock(), cache.snapshot().last_update);
    }

    #[test]
    fn unknown_topic_is_ignored() {
        let mut publisher = MockUpdatePublisher::new();
        publisher.expect_publish().never();
        let (dispatcher, cache) = dispatcher_with(publisher);

        let outcome = dispatcher.dispatch(TopicUpdate::new("workerPublishSilver", json!(1)));

        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(cache.snapshot(), crate::domain::cache::Snapshot::default());
    }
}
