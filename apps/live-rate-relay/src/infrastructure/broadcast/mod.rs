//! Subscriber Fan-Out
//!
//! Delivers live updates to every registered downstream subscriber.
//!
//! # Architecture
//!
//! Each subscriber owns a bounded queue. Publishing serializes the update
//! once into a reference-counted [`Utf8Bytes`] buffer and offers clones of it
//! to every queue with `try_send`, so a slow
//! subscriber never stalls the upstream loop or its peers. When a queue is
//! full the message is dropped for that subscriber only and counted in
//! `relay_deliveries_dropped_total`.
//!
//! The registry lock is held only long enough to clone the senders; no
//! delivery happens under the lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::BroadcastSettings;
use crate::application::ports::UpdatePublisher;
use crate::domain::streaming::LiveUpdate;
use crate::domain::topic::TopicKind;
use crate::infrastructure::metrics;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for subscriber queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Messages buffered per subscriber before deliveries are dropped.
    pub subscriber_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 256,
        }
    }
}

impl From<BroadcastSettings> for BroadcastConfig {
    fn from(settings: BroadcastSettings) -> Self {
        Self {
            subscriber_capacity: settings.subscriber_capacity,
        }
    }
}

// =============================================================================
// Subscriber Registry
// =============================================================================

/// Identity of one downstream subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Set of live subscribers and their outbound queues.
#[derive(Debug)]
pub struct Broadcaster {
    config: BroadcastConfig,
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Utf8Bytes>>>,
}

/// Shared broadcaster handle.
pub type SharedBroadcaster = Arc<Broadcaster>;

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(BroadcastConfig::default())
    }
}

impl Broadcaster {
    /// Create an empty broadcaster.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            config,
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a subscriber and return its id and queue.
    ///
    /// The subscriber receives every update published after this call.
    pub fn register(&self) -> (SubscriberId, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity.max(1));
        let id = SubscriberId::new();

        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.insert(id, tx);
            subscribers.len()
        };
        metrics::set_subscribers(count);
        tracing::debug!(subscriber = %id, subscribers = count, "Subscriber registered");

        (id, rx)
    }

    /// Remove a subscriber. Removing an unknown id is a no-op.
    ///
    /// Returns whether the subscriber was registered.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers.write();
            let removed = subscribers.remove(&id).is_some();
            (removed, subscribers.len())
        };
        if removed {
            metrics::set_subscribers(count);
            tracing::debug!(subscriber = %id, subscribers = count, "Subscriber unregistered");
        }
        removed
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Offer one serialized message to every subscriber.
    ///
    /// Returns how many queues accepted it.
    pub fn broadcast(&self, message: &Utf8Bytes) -> usize {
        let targets: Vec<(SubscriberId, mpsc::Sender<Utf8Bytes>)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut dropped = 0u64;
        for (id, tx) in targets {
            match tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    tracing::debug!(subscriber = %id, "Subscriber queue full, dropping update");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::trace!(subscriber = %id, "Subscriber queue closed");
                }
            }
        }

        if dropped > 0 {
            metrics::record_deliveries_dropped(dropped);
        }
        delivered
    }
}

impl UpdatePublisher for Broadcaster {
    fn publish(&self, update: &LiveUpdate) -> usize {
        let message = match serde_json::to_string(update) {
            Ok(text) => Utf8Bytes::from(text),
            Err(e) => {
                tracing::warn!(target_topic = %update.target, error = %e, "Failed to serialize live update");
                return 0;
            }
        };

        let label = match update.target.kind() {
            TopicKind::Live(slot) => slot.as_str(),
            TopicKind::Metadata(_) | TopicKind::Unknown => "other",
        };
        metrics::record_update_published(label);

        self.broadcast(&message)
    }
}
