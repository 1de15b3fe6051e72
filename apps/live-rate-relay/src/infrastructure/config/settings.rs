//! Relay Configuration Settings
//!
//! Configuration types for the relay, loaded from environment variables.
//! Only `WS_URL` is required; every other value has a default and an
//! unparsable value falls back to it.

use std::str::FromStr;
use std::time::Duration;

/// Default `Origin` header for the upstream upgrade request.
pub const DEFAULT_ORIGIN: &str = "https://radhikajewellers.in";

/// Default upstream channel.
pub const DEFAULT_CHANNEL: &str = "radhika";

/// Upstream connection settings.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Upstream WebSocket URL.
    pub url: String,
    /// `Origin` header sent with the upgrade request.
    pub origin: String,
    /// Channel named in the subscribe record.
    pub channel: String,
    /// Interval between keep-alive records.
    pub keepalive_interval: Duration,
    /// Silence after which the connection is treated as dead (`None` = never).
    pub idle_timeout: Option<Duration>,
    /// Delay between a close and the next connection attempt.
    pub reconnect_delay: Duration,
}

impl UpstreamSettings {
    /// Settings for `url` with every other value at its default.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            origin: DEFAULT_ORIGIN.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            keepalive_interval: Duration::from_secs(15),
            idle_timeout: Some(Duration::from_secs(60)),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Subscriber queue settings.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastSettings {
    /// Messages buffered per subscriber before deliveries are dropped.
    pub subscriber_capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            subscriber_capacity: 256,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Copy)]
pub struct ServerSettings {
    /// Port serving the WebSocket stream, the snapshot query and health.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Upstream connection settings.
    pub upstream: UpstreamSettings,
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Subscriber queue settings.
    pub broadcast: BroadcastSettings,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `WS_URL` is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `WS_URL` is missing or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("WS_URL").ok_or_else(|| ConfigError::MissingEnvVar("WS_URL".to_string()))?;
        if url.trim().is_empty() {
            return Err(ConfigError::EmptyValue("WS_URL".to_string()));
        }

        let defaults = UpstreamSettings::with_url(url.trim());

        let origin = lookup("UPSTREAM_ORIGIN")
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.origin);
        let channel = lookup("UPSTREAM_CHANNEL")
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.channel);

        // Zero intervals would spin; treat them like unparsable values.
        let keepalive_interval = parse_env::<u64, _>(&lookup, "UPSTREAM_KEEPALIVE_INTERVAL_SECS")
            .filter(|secs| *secs > 0)
            .map_or(defaults.keepalive_interval, Duration::from_secs);

        let idle_timeout = match parse_env::<u64, _>(&lookup, "UPSTREAM_IDLE_TIMEOUT_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.idle_timeout,
        };

        let reconnect_delay = parse_env::<u64, _>(&lookup, "UPSTREAM_RECONNECT_DELAY_MS")
            .filter(|ms| *ms > 0)
            .map_or(defaults.reconnect_delay, Duration::from_millis);

        let server = ServerSettings {
            port: parse_env(&lookup, "PORT").unwrap_or(ServerSettings::default().port),
        };

        let broadcast = BroadcastSettings {
            subscriber_capacity: parse_env::<usize, _>(&lookup, "SUBSCRIBER_QUEUE_CAPACITY")
                .filter(|capacity| *capacity > 0)
                .unwrap_or(BroadcastSettings::default().subscriber_capacity),
        };

        Ok(Self {
            upstream: UpstreamSettings {
                url: defaults.url,
                origin,
                channel,
                keepalive_interval,
                idle_timeout,
                reconnect_delay,
            },
            server,
            broadcast,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable setting, using default");
            None
        }
    }
}
