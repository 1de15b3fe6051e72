//! Configuration Module
//!
//! Environment-driven configuration for the relay.

mod settings;

pub use settings::{BroadcastSettings, ConfigError, RelayConfig, ServerSettings, UpstreamSettings};
