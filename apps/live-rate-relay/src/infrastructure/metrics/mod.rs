//! Prometheus Metrics Module
//!
//! Exposes relay metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Upstream**: messages and records received, malformed records,
//!   connection state and reconnects
//! - **Fan-out**: updates published, deliveries dropped, subscriber count
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP listener.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed (another global recorder is
/// already registered).
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "relay_upstream_messages_received_total",
        "Total text messages received from the upstream feed"
    );
    describe_counter!(
        "relay_upstream_records_total",
        "Total delimited records received from the upstream feed by kind"
    );
    describe_counter!(
        "relay_upstream_records_malformed_total",
        "Total upstream records that failed to decode, by failure kind"
    );
    describe_counter!(
        "relay_updates_published_total",
        "Total live updates published to subscribers"
    );
    describe_counter!(
        "relay_deliveries_dropped_total",
        "Total deliveries dropped because a subscriber queue was full"
    );
    describe_gauge!(
        "relay_subscribers",
        "Number of registered downstream subscribers"
    );
    describe_gauge!(
        "relay_upstream_connected",
        "1 while the upstream connection is subscribed, 0 otherwise"
    );
    describe_counter!(
        "relay_upstream_reconnects_total",
        "Total upstream reconnection attempts"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for upstream record kinds.
#[derive(Debug, Clone, Copy)]
pub enum RecordKind {
    /// Keep-alive record.
    Ping,
    /// Data record carrying a payload.
    Data,
    /// Record that is neither ping nor data.
    Ignored,
}

impl RecordKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Data => "data",
            Self::Ignored => "ignored",
        }
    }
}

/// Record a text message received from the upstream feed.
pub fn record_message_received() {
    counter!("relay_upstream_messages_received_total").increment(1);
}

/// Record one delimited upstream record.
pub fn record_upstream_record(kind: RecordKind) {
    counter!(
        "relay_upstream_records_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record an upstream record that failed to decode.
pub fn record_malformed_record(failure: &'static str) {
    counter!(
        "relay_upstream_records_malformed_total",
        "failure" => failure
    )
    .increment(1);
}

/// Record a live update published to subscribers.
pub fn record_update_published(topic: &'static str) {
    counter!(
        "relay_updates_published_total",
        "topic" => topic
    )
    .increment(1);
}

/// Record deliveries dropped due to full subscriber queues.
pub fn record_deliveries_dropped(count: u64) {
    counter!("relay_deliveries_dropped_total").increment(count);
}

/// Update the registered subscriber count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribers(count: usize) {
    gauge!("relay_subscribers").set(count as f64);
}

/// Update the upstream connection flag.
pub fn set_upstream_connected(connected: bool) {
    gauge!("relay_upstream_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record an upstream reconnection attempt.
pub fn record_reconnect() {
    counter!("relay_upstream_reconnects_total").increment(1);
}

// =============================================================================
// Tests
// =============================================================================
