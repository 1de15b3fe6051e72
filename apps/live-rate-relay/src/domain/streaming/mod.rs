//! Downstream Envelopes
//!
//! JSON shapes pushed to subscribers and returned by the snapshot query.
//!
//! ```json
//! {"target":"workerPublishCoin","data":{"BTC":50000},"timestamp":"2024-03-15T10:30:00.123Z"}
//! {"target":"initialStore","data":{...snapshot...}}
//! {"success":true,"data":{...snapshot...}}
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::cache::{Snapshot, serialize_timestamp};
use super::topic::Topic;

/// Target name of the envelope sent once to every new subscriber.
pub const INITIAL_STORE_TARGET: &str = "initialStore";

/// A live topic update, broadcast to every subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveUpdate {
    /// Topic the payload belongs to.
    pub target: Topic,
    /// Decoded payload.
    pub data: Value,
    /// Time the cache slot was written.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Envelope carrying the full snapshot to a newly connected subscriber.
#[derive(Debug, Clone, Serialize)]
pub struct InitialStore<'a> {
    target: &'static str,
    data: &'a Snapshot,
}

impl<'a> InitialStore<'a> {
    /// Wrap a snapshot.
    #[must_use]
    pub const fn new(data: &'a Snapshot) -> Self {
        Self {
            target: INITIAL_STORE_TARGET,
            data,
        }
    }
}

/// Response body of the snapshot query.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResponse {
    /// Always `true`; the cache is readable even when stale.
    pub success: bool,
    /// Current snapshot.
    pub data: Snapshot,
}

impl From<Snapshot> for SnapshotResponse {
    fn from(data: Snapshot) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
