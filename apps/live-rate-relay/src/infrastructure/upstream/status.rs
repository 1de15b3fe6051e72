//! Upstream Connection Status
//!
//! Shared, lock-light view of the upstream connection used by the health
//! endpoints and the connection loop.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Upstream connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and no attempt scheduled yet.
    #[default]
    Disconnected,
    /// Opening the WebSocket.
    Connecting,
    /// Sending the handshake and subscription records.
    Handshaking,
    /// Subscribed and pumping messages.
    Subscribed,
    /// Waiting out the reconnect delay.
    ReconnectWait,
}

impl ConnectionState {
    /// State name as reported by the health endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Subscribed => "subscribed",
            Self::ReconnectWait => "reconnect_wait",
        }
    }
}

/// Tracks the state of the upstream connection.
#[derive(Debug, Default)]
pub struct UpstreamStatus {
    state: RwLock<ConnectionState>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    connections: AtomicU64,
    reconnect_attempts: AtomicU32,
    messages_received: AtomicU64,
}

impl UpstreamStatus {
    /// Create status in the `Disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection state.
    ///
    /// Entering `Subscribed` counts a connection, clears the last error and
    /// resets the reconnect attempt counter.
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        if state == ConnectionState::Subscribed {
            *self.last_connected_at.write() = Some(Utc::now());
            *self.last_error.write() = None;
            self.connections.fetch_add(1, Ordering::Relaxed);
            self.reconnect_attempts.store(0, Ordering::Relaxed);
        }
    }

    /// Record the error that ended the last connection.
    pub fn set_error(&self, message: String) {
        *self.last_error.write() = Some(message);
    }

    /// Increment reconnect attempts.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment messages received counter.
    pub fn increment_messages(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether the upstream is subscribed right now.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.state() == ConnectionState::Subscribed
    }

    /// When the current or last connection was established.
    #[must_use]
    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        *self.last_connected_at.read()
    }

    /// Error that ended the last connection, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Connections established since start.
    #[must_use]
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Reconnect attempts since the last successful connection.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Messages received since start.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }
}
