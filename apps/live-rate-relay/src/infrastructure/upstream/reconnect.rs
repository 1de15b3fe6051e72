//! Reconnection Policy
//!
//! Fixed-delay reconnection for the upstream connection. The relay retries
//! for as long as the process runs: there is no backoff and no attempt cap,
//! so an outage of any length heals on its own once the upstream returns.

use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay between a connection closing and the next attempt.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectConfig {
    /// Create a new configuration with a custom delay.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Create configuration from `UpstreamSettings`.
    #[must_use]
    pub const fn from_upstream_settings(settings: &crate::UpstreamSettings) -> Self {
        Self {
            delay: settings.reconnect_delay,
        }
    }
}

/// Reconnection policy with a fixed delay and unlimited attempts.
///
/// # Example
///
/// ```rust
/// use live_rate_relay::infrastructure::upstream::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// assert_eq!(policy.next_delay(), Duration::from_secs(5));
/// assert_eq!(policy.attempt_count(), 1);
///
/// // Connection established
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Count an attempt and return the delay to wait before it.
    #[must_use]
    pub const fn next_delay(&mut self) -> Duration {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.config.delay
    }

    /// Reset the attempt counter after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Consecutive attempts since the last successful connection.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }
}
