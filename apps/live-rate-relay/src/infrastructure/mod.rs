//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the process
//! plumbing around them.

/// Upstream WebSocket client for the rate feed.
pub mod upstream;

/// Subscriber fan-out.
pub mod broadcast;

/// HTTP listener: subscriber stream, snapshot query, health.
pub mod http;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
