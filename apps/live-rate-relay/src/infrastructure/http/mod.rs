//! HTTP Surface
//!
//! One axum listener serves subscribers, the snapshot query and the
//! operational endpoints.
//!
//! # Endpoints
//!
//! - `GET /ws/stream` - WebSocket stream of live updates
//! - `GET /api/latest` - Current snapshot as JSON
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (upstream subscribed)
//! - `GET /metrics` - Prometheus metrics in text format

mod gateway;
mod health;
mod query;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::domain::cache::SharedCacheStore;
use crate::infrastructure::broadcast::SharedBroadcaster;
use crate::infrastructure::upstream::UpstreamStatus;

pub use health::{HealthResponse, HealthStatus, UpstreamInfo};

// =============================================================================
// Shared State
// =============================================================================

/// State shared by every HTTP handler.
pub struct AppState {
    version: String,
    started_at: Instant,
    cache: SharedCacheStore,
    broadcaster: SharedBroadcaster,
    upstream: Arc<UpstreamStatus>,
    shutdown: CancellationToken,
}

/// Shared handler state.
pub type SharedAppState = Arc<AppState>;

impl AppState {
    /// Create handler state.
    ///
    /// Open subscriber sessions are closed when `shutdown` is cancelled.
    #[must_use]
    pub fn new(
        version: String,
        cache: SharedCacheStore,
        broadcaster: SharedBroadcaster,
        upstream: Arc<UpstreamStatus>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            cache,
            broadcaster,
            upstream,
            shutdown,
        }
    }
}

/// Build the relay router.
pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/ws/stream", get(gateway::stream_handler))
        .route("/api/latest", get(query::latest_handler))
        .route("/health", get(health::health_handler))
        .route("/healthz", get(health::liveness_handler))
        .route("/readyz", get(health::readiness_handler))
        .route("/metrics", get(health::metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Server
// =============================================================================

/// HTTP server for subscribers, snapshot queries and health.
pub struct HttpServer {
    port: u16,
    state: SharedAppState,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new HTTP server.
    #[must_use]
    pub const fn new(port: u16, state: SharedAppState, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Bind all interfaces on the configured port and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))?;

        serve(listener, self.state, self.cancel).await
    }
}

/// Serve the relay router on an already bound listener until cancelled.
///
/// # Errors
///
/// Returns `HttpServerError::ServerFailed` if the server stops with an error.
pub async fn serve(
    listener: TcpListener,
    state: SharedAppState,
    cancel: CancellationToken,
) -> Result<(), HttpServerError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "HTTP server listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

// =============================================================================
// Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::cache::CacheStore;
    use crate::infrastructure::broadcast::Broadcaster;

    /// Handler state over fresh components.
    pub fn state() -> SharedAppState {
        Arc::new(AppState::new(
            "test".to_string(),
            Arc::new(CacheStore::new()),
            Arc::new(Broadcaster::default()),
            Arc::new(UpstreamStatus::new()),
            CancellationToken::new(),
        ))
    }
}
