//! Live Rate Relay Binary
//!
//! Starts the upstream client and the HTTP listener.
//!
//! # Usage
//!
//! ```bash
//! WS_URL=wss://feed.example.com/hub cargo run --bin live-rate-relay
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `WS_URL`: Upstream WebSocket URL
//!
//! ## Optional
//! - `PORT`: HTTP listen port (default: 3000)
//! - `UPSTREAM_ORIGIN`: Origin header (default: <https://radhikajewellers.in>)
//! - `UPSTREAM_CHANNEL`: Subscribed channel (default: radhika)
//! - `UPSTREAM_KEEPALIVE_INTERVAL_SECS`: Keep-alive interval (default: 15)
//! - `UPSTREAM_IDLE_TIMEOUT_SECS`: Idle timeout, 0 disables (default: 60)
//! - `UPSTREAM_RECONNECT_DELAY_MS`: Reconnect delay (default: 5000)
//! - `SUBSCRIBER_QUEUE_CAPACITY`: Per-subscriber queue (default: 256)
//! - `OTEL_ENABLED`: Export traces over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: live-rate-relay)
//! - `RUST_LOG`: Log filter (default: `live_rate_relay=info`)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use live_rate_relay::infrastructure::broadcast::{BroadcastConfig, Broadcaster};
use live_rate_relay::infrastructure::http::{AppState, HttpServer};
use live_rate_relay::infrastructure::telemetry;
use live_rate_relay::infrastructure::upstream::{
    UpstreamClient, UpstreamClientConfig, UpstreamStatus,
};
use live_rate_relay::{CacheStore, RelayConfig, UpdateDispatcher, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Fails only if another provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let dotenv = dotenvy::dotenv();

    let _telemetry_guard = telemetry::init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting live rate relay");

    let _metrics_handle = init_metrics();

    let config = RelayConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let cache = Arc::new(CacheStore::new());
    let broadcaster = Arc::new(Broadcaster::new(BroadcastConfig::from(config.broadcast)));
    let dispatcher = Arc::new(UpdateDispatcher::new(
        Arc::clone(&cache),
        Arc::clone(&broadcaster) as _,
    ));
    let upstream_status = Arc::new(UpstreamStatus::new());

    let app_state = Arc::new(AppState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&cache),
        Arc::clone(&broadcaster),
        Arc::clone(&upstream_status),
        shutdown_token.clone(),
    ));
    let http_server = HttpServer::new(config.server.port, app_state, shutdown_token.clone());

    let upstream_client = Arc::new(UpstreamClient::new(
        UpstreamClientConfig::from_upstream_settings(&config.upstream),
        dispatcher,
        upstream_status,
        shutdown_token.clone(),
    ));

    let mut http_handle = tokio::spawn(http_server.run());
    let upstream_handle = tokio::spawn(upstream_client.run());

    tracing::info!("Relay ready");

    tokio::select! {
        () = await_shutdown() => {}
        joined = &mut http_handle => {
            // The listener only returns early on failure.
            shutdown_token.cancel();
            let _ = upstream_handle.await;
            joined
                .context("HTTP server task panicked")?
                .context("HTTP server failed")?;
            return Ok(());
        }
    }

    shutdown_token.cancel();
    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = upstream_handle.await;
        if let Ok(Err(e)) = http_handle.await {
            tracing::error!(error = %e, "HTTP server error during shutdown");
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!("Shutdown timed out");
    }

    tracing::info!("Relay stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        upstream_url = %config.upstream.url,
        channel = %config.upstream.channel,
        port = config.server.port,
        "Configuration loaded"
    );
    tracing::debug!(
        origin = %config.upstream.origin,
        keepalive_secs = config.upstream.keepalive_interval.as_secs(),
        idle_timeout_secs = config.upstream.idle_timeout.map(|t| t.as_secs()),
        reconnect_delay_ms = config.upstream.reconnect_delay.as_millis(),
        subscriber_capacity = config.broadcast.subscriber_capacity,
        "Relay settings"
    );
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
