#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Live Rate Relay - Market Rate Fan-Out
//!
//! Keeps a single WebSocket subscription to an upstream rate feed, caches
//! the latest value of every topic, and relays live updates to any number
//! of downstream WebSocket subscribers. The cached snapshot is also served
//! over plain HTTP.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Topics, the cache store and downstream envelopes
//!   - `topic`: Topic names and their cache slots
//!   - `cache`: Latest-value store and snapshot
//!   - `streaming`: Live update, initial store and query envelopes
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: `UpdatePublisher` fan-out contract
//!   - `services`: `UpdateDispatcher` (cache write, then publish)
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `upstream`: Feed client, record codec, keep-alive, reconnect
//!   - `broadcast`: Per-subscriber queues
//!   - `http`: `/ws/stream`, `/api/latest`, health and metrics
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//!                                      ┌─────────────┐
//! Upstream WS ──► FrameCodec ──► Dispatcher ──► CacheStore ◄── GET /api/latest
//!                                      │      └─────────────┘
//!                                      ▼
//!                               ┌─────────────┐
//!                               │ Broadcaster │──► /ws/stream subscriber 1
//!                               │             │──► /ws/stream subscriber N
//!                               └─────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Topics, cache and envelopes with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::cache::{CacheStore, SharedCacheStore, Snapshot};
pub use domain::streaming::{InitialStore, LiveUpdate, SnapshotResponse};
pub use domain::topic::{Topic, TopicKind, TopicUpdate};

// Application
pub use application::ports::UpdatePublisher;
pub use application::services::{DispatchOutcome, UpdateDispatcher};

// Infrastructure config
pub use infrastructure::config::{
    BroadcastSettings, ConfigError, RelayConfig, ServerSettings, UpstreamSettings,
};

// HTTP server
pub use infrastructure::http::{AppState, HttpServer, HttpServerError, SharedAppState};

// Broadcaster
pub use infrastructure::broadcast::{BroadcastConfig, Broadcaster, SharedBroadcaster, SubscriberId};

// Upstream client
pub use infrastructure::upstream::{
    ConnectionState, UpstreamClient, UpstreamClientConfig, UpstreamClientError, UpstreamStatus,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
