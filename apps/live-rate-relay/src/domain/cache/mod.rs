//! Latest-Value Cache
//!
//! Holds the most recent decoded payload for every known topic. Each write
//! replaces a whole slot; there is no merging and no history.
//!
//! # Consistency
//!
//! All slots live behind a single `RwLock`. A slot replace is one assignment
//! under the write lock, so readers never observe a partially written slot,
//! and a snapshot is always a consistent copy of every slot at one instant.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::topic::{LiveSlot, MetadataSlot};

// =============================================================================
// Snapshot
// =============================================================================

/// Copy of every cache slot at a point in time.
///
/// Serialized with the field names downstream consumers already rely on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Latest `contactDetails` payload.
    pub contact_details: Value,
    /// Latest `referanceDetails` payload.
    #[serde(rename = "referanceDetails")]
    pub reference_details: Value,
    /// Latest `workerPublish` payload.
    pub live_rates: Value,
    /// Latest `workerPublishCoin` payload.
    pub worker_publish_coin: Value,
    /// When `liveRates` was last written.
    #[serde(serialize_with = "serialize_optional_timestamp")]
    pub last_update: Option<DateTime<Utc>>,
    /// When `workerPublishCoin` was last written.
    #[serde(serialize_with = "serialize_optional_timestamp")]
    pub coin_last_update: Option<DateTime<Utc>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            contact_details: Value::Null,
            reference_details: Value::Null,
            live_rates: Value::Object(serde_json::Map::new()),
            worker_publish_coin: Value::Null,
            last_update: None,
            coin_last_update: None,
        }
    }
}

impl Snapshot {
    /// Most recent write to either live slot.
    #[must_use]
    pub fn last_live_update(&self) -> Option<DateTime<Utc>> {
        self.last_update.max(self.coin_last_update)
    }
}

// =============================================================================
// Cache Store
// =============================================================================

/// Thread-safe store of the latest value per topic.
#[derive(Debug, Default)]
pub struct CacheStore {
    slots: RwLock<Snapshot>,
}

/// Shared cache store reference.
pub type SharedCacheStore = Arc<CacheStore>;

impl CacheStore {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a metadata slot.
    pub fn write_metadata(&self, slot: MetadataSlot, value: Value) {
        let mut slots = self.slots.write();
        match slot {
            MetadataSlot::ContactDetails => slots.contact_details = value,
            MetadataSlot::ReferenceDetails => slots.reference_details = value,
        }
    }

    /// Replace a live slot and stamp its update time.
    pub fn write_live(&self, slot: LiveSlot, value: Value, at: DateTime<Utc>) {
        let mut slots = self.slots.write();
        match slot {
            LiveSlot::Rates => {
                slots.live_rates = value;
                slots.last_update = Some(at);
            }
            LiveSlot::Coins => {
                slots.worker_publish_coin = value;
                slots.coin_last_update = Some(at);
            }
        }
    }

    /// Copy of the current state of every slot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.slots.read().clone()
    }

    /// Most recent write to either live slot.
    #[must_use]
    pub fn last_live_update(&self) -> Option<DateTime<Utc>> {
        self.slots.read().last_live_update()
    }
}

// =============================================================================
// Timestamps
// =============================================================================

/// Format a timestamp as ISO-8601 UTC with millisecond precision
/// (`2024-03-15T10:30:00.123Z`).
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serialize a timestamp with [`format_timestamp`].
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize_timestamp<S: Serializer>(
    at: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(*at))
}

fn serialize_optional_timestamp<S: Serializer>(
    at: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match at {
        Some(at) => serialize_timestamp(at, serializer),
        None => serializer.serialize_none(),
    }
}
