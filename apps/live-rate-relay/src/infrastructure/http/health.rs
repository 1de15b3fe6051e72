//! Health Check and Metrics Endpoints
//!
//! Connection status reporting and Prometheus metrics for orchestrators,
//! load balancers, and monitoring systems.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AppState, SharedAppState};
use crate::infrastructure::metrics::get_metrics_handle;
use crate::infrastructure::upstream::UpstreamStatus;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Relay version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Upstream connection status.
    pub upstream: UpstreamInfo,
    /// Registered downstream subscribers.
    pub subscribers: usize,
    /// Most recent live topic write.
    pub last_live_update: Option<DateTime<Utc>>,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Upstream subscribed.
    Healthy,
    /// Upstream down but cached data is being served.
    Degraded,
    /// Upstream down and nothing cached.
    Unhealthy,
}

/// Upstream connection status.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamInfo {
    /// Connection state.
    pub state: &'static str,
    /// Whether the upstream is subscribed.
    pub connected: bool,
    /// Connections established since start.
    pub connections: u64,
    /// Messages received since start.
    pub messages_received: u64,
    /// Reconnect attempts since the last successful connection.
    pub reconnect_attempts: u32,
    /// When the current or last connection was established.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Error that ended the last connection.
    pub last_error: Option<String>,
}

impl From<&UpstreamStatus> for UpstreamInfo {
    fn from(status: &UpstreamStatus) -> Self {
        let state = status.state();
        Self {
            state: state.as_str(),
            connected: status.is_subscribed(),
            connections: status.connections(),
            messages_received: status.messages_received(),
            reconnect_attempts: status.reconnect_attempts(),
            last_connected_at: status.last_connected_at(),
            last_error: status.last_error(),
        }
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

pub(super) async fn health_handler(State(state): State<SharedAppState>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

pub(super) async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub(super) async fn readiness_handler(State(state): State<SharedAppState>) -> impl IntoResponse {
    if state.upstream.is_subscribed() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

pub(super) async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let upstream = UpstreamInfo::from(state.upstream.as_ref());
    let last_live_update = state.cache.last_live_update();

    HealthResponse {
        status: determine_health_status(upstream.connected, last_live_update.is_some()),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        upstream,
        subscribers: state.broadcaster.subscriber_count(),
        last_live_update,
    }
}

const fn determine_health_status(connected: bool, has_live_data: bool) -> HealthStatus {
    match (connected, has_live_data) {
        (true, _) => HealthStatus::Healthy,
        (false, true) => HealthStatus::Degraded,
        (false, false) => HealthStatus::Unhealthy,
    }
}

// =============================================================================
// Tests
// =============================================================================
