//! Keep-Alive Timer
//!
//! Periodically asks the connection loop to send a `{"type":6}` record and
//! watches inbound activity. If nothing arrives from the upstream within the
//! idle timeout the connection is reported dead.
//!
//! One timer belongs to one connection. It stops when its cancellation token
//! is cancelled, which the connection loop does exactly once when the
//! connection ends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Tick period bounds; configured intervals are clamped into this range.
const MIN_PERIOD: Duration = Duration::from_millis(1);
const MAX_PERIOD: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Configuration for keep-alive behavior.
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    /// Interval between keep-alive records.
    pub interval: Duration,
    /// Maximum silence from the upstream before the connection is considered
    /// dead. `None` disables the check.
    pub idle_timeout: Option<Duration>,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            idle_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl KeepAliveConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(interval: Duration, idle_timeout: Option<Duration>) -> Self {
        Self {
            interval,
            idle_timeout,
        }
    }

    /// Create configuration from `UpstreamSettings`.
    #[must_use]
    pub const fn from_upstream_settings(settings: &crate::UpstreamSettings) -> Self {
        Self {
            interval: settings.keepalive_interval,
            idle_timeout: settings.idle_timeout,
        }
    }
}

/// Events emitted by the keep-alive timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveEvent {
    /// Send a keep-alive record.
    SendPing,
    /// The upstream has been silent for longer than the idle timeout.
    IdleTimeout,
}

/// Inbound activity shared between the timer and the connection loop.
#[derive(Debug)]
pub struct ActivityState {
    last_inbound: RwLock<Instant>,
}

impl Default for ActivityState {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityState {
    /// Create state marked active now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_inbound: RwLock::new(Instant::now()),
        }
    }

    /// Record that something was received from the upstream.
    pub fn record_inbound(&self) {
        *self.last_inbound.write() = Instant::now();
    }

    /// Time since the upstream last sent anything.
    #[must_use]
    pub fn time_since_inbound(&self) -> Duration {
        self.last_inbound.read().elapsed()
    }
}

/// Keep-alive timer for one upstream connection.
pub struct KeepAliveTimer {
    config: KeepAliveConfig,
    state: Arc<ActivityState>,
    event_tx: mpsc::Sender<KeepAliveEvent>,
    cancel: CancellationToken,
}

impl KeepAliveTimer {
    /// Create a new timer.
    #[must_use]
    pub const fn new(
        config: KeepAliveConfig,
        state: Arc<ActivityState>,
        event_tx: mpsc::Sender<KeepAliveEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            state,
            event_tx,
            cancel,
        }
    }

    /// Run until cancelled, the event channel closes, or an idle timeout.
    ///
    /// The first tick fires one full interval after start.
    pub async fn run(self) {
        let period = self.config.interval.clamp(MIN_PERIOD, MAX_PERIOD);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::debug!("Keep-alive timer cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if self.tick().await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// Check inbound activity and request a keep-alive record.
    ///
    /// Returns `Err(())` if the loop should exit.
    async fn tick(&self) -> Result<(), ()> {
        if let Some(idle_timeout) = self.config.idle_timeout {
            let silent_for = self.state.time_since_inbound();
            if silent_for > idle_timeout {
                tracing::warn!(
                    silent_secs = silent_for.as_secs(),
                    timeout_secs = idle_timeout.as_secs(),
                    "Upstream idle timeout"
                );
                let _ = self.event_tx.send(KeepAliveEvent::IdleTimeout).await;
                return Err(());
            }
        }

        if self.event_tx.send(KeepAliveEvent::SendPing).await.is_err() {
            tracing::debug!("Event channel closed, stopping keep-alive timer");
            return Err(());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = KeepAliveConfig::default();
        assert_eq!(config.interval, Duration::from_secs(15));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn activity_state_resets_on_inbound() {
        let state = ActivityState::new();
        *state.last_inbound.write() = Instant::now()
            .checked_sub(Duration::from_secs(5))
            .unwrap();
        assert!(state.time_since_inbound() >= Duration::from_secs(5));

        state.record_inbound();
        assert!(state.time_since_inbound() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn first_ping_waits_one_interval() {
        let config = KeepAliveConfig::new(Duration::from_millis(100), None);
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let timer = KeepAliveTimer::new(
            config,
            Arc::new(ActivityState::new()),
            event_tx,
            cancel.clone(),
        );

        let started = Instant::now();
        let handle = tokio::spawn(timer.run());

        let event = tokio::time::timeout(Duration::from_millis(500), event_rx.recv())
            .await
            .expect("should receive event")
            .expect("channel should not close");

        assert_eq!(event, KeepAliveEvent::SendPing);
        assert!(started.elapsed() >= Duration::from_millis(90));

        cancel.cancel();
        handle.await.expect("task should complete");
    }

    #[tokio::test]
    async fn sends_pings_periodically() {
        let config = KeepAliveConfig::new(Duration::from_millis(30), None);
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let timer = KeepAliveTimer::new(
            config,
            Arc::new(ActivityState::new()),
            event_tx,
            cancel.clone(),
        );
        let handle = tokio::spawn(timer.run());

        for _ in 0..3 {
            let event = tokio::time::timeout(Duration::from_millis(500), event_rx.recv())
                .await
                .expect("should receive event");
            assert_eq!(event, Some(KeepAliveEvent::SendPing));
        }

        cancel.cancel();
        handle.await.expect("task should complete");
    }

    #[tokio::test]
    async fn no_ticks_after_cancellation() {
        let config = KeepAliveConfig::new(Duration::from_millis(30), None);
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let timer = KeepAliveTimer::new(
            config,
            Arc::new(ActivityState::new()),
            event_tx,
            cancel.clone(),
        );
        let handle = tokio::spawn(timer.run());

        let first = tokio::time::timeout(Duration::from_millis(500), event_rx.recv()).await;
        assert!(matches!(first, Ok(Some(KeepAliveEvent::SendPing))));

        cancel.cancel();
        handle.await.expect("task should complete");

        // Drain anything sent before the cancel landed; the sender is gone now.
        while event_rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(event_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn detects_idle_upstream() {
        let config = KeepAliveConfig::new(Duration::from_millis(30), Some(Duration::from_millis(50)));
        let state = Arc::new(ActivityState::new());
        *state.last_inbound.write() = Instant::now()
            .checked_sub(Duration::from_millis(200))
            .unwrap();
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let timer = KeepAliveTimer::new(config, state, event_tx, cancel.clone());
        let handle = tokio::spawn(timer.run());

        let event = tokio::time::timeout(Duration::from_millis(500), event_rx.recv())
            .await
            .expect("should receive event");
        assert_eq!(event, Some(KeepAliveEvent::IdleTimeout));

        // Timer exits on its own after reporting the timeout.
        let result = tokio::time::timeout(Duration::from_millis(200), handle).await;
        assert!(result.is_ok(), "timer should stop after idle timeout");
    }

    #[tokio::test]
    async fn huge_interval_never_ticks_and_still_cancels() {
        let config = KeepAliveConfig::new(Duration::from_secs(u64::MAX), None);
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let timer = KeepAliveTimer::new(config, Arc::new(ActivityState::new()), event_tx, cancel.clone());
        let handle = tokio::spawn(timer.run());

        let early = tokio::time::timeout(Duration::from_millis(100), event_rx.recv()).await;
        assert!(early.is_err(), "no keep-alive expected yet");

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("timer should stop on cancellation");
        assert!(result.is_ok(), "timer task should not panic");
    }

    #[tokio::test]
    async fn cancellation_stops_timer_promptly() {
        let config = KeepAliveConfig::new(Duration::from_secs(10), None);
        let (event_tx, _event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let timer = KeepAliveTimer::new(config, Arc::new(ActivityState::new()), event_tx, cancel.clone());

        let handle = tokio::spawn(timer.run());
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_millis(100), handle).await;
        assert!(result.is_ok(), "timer should shut down on cancellation");
    }
}
