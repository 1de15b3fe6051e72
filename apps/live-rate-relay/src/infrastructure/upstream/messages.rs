//! Upstream Wire Records
//!
//! The upstream feed speaks a SignalR-style JSON hub protocol. Every record
//! is a JSON object terminated by the ASCII record separator (`0x1E`); one
//! WebSocket message may carry several records.
//!
//! # Outbound
//!
//! - Handshake: `{"protocol":"json","version":1}`
//! - Subscribe: `{"arguments":["<channel>"],"invocationId":"0","target":"client","type":1}`
//! - Keep-alive: `{"type":6}`
//!
//! # Inbound
//!
//! - `type` 6: keep-alive, ignored
//! - `type` 1: invocation; `target` is the topic and `arguments[0]` a
//!   base64-encoded gzip-compressed JSON payload

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record separator terminating every protocol record.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Invocation record type.
pub const TYPE_INVOCATION: i64 = 1;

/// Keep-alive record type.
pub const TYPE_PING: i64 = 6;

// =============================================================================
// Outbound Records
// =============================================================================

/// Protocol negotiation sent first on every connection.
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeRequest {
    /// Hub protocol name.
    pub protocol: &'static str,
    /// Hub protocol version.
    pub version: u32,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            protocol: "json",
            version: 1,
        }
    }
}

/// Subscription invocation naming the channel this relay consumes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    /// Channel name as the single argument.
    pub arguments: Vec<String>,
    /// Invocation id.
    pub invocation_id: String,
    /// Hub method.
    pub target: String,
    /// Record type.
    #[serde(rename = "type")]
    pub kind: i64,
}

impl SubscribeRequest {
    /// Subscribe to `channel`.
    #[must_use]
    pub fn channel(channel: impl Into<String>) -> Self {
        Self {
            arguments: vec![channel.into()],
            invocation_id: "0".to_string(),
            target: "client".to_string(),
            kind: TYPE_INVOCATION,
        }
    }
}

/// Keep-alive ping.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PingRecord {
    #[serde(rename = "type")]
    kind: i64,
}

impl Default for PingRecord {
    fn default() -> Self {
        Self { kind: TYPE_PING }
    }
}

/// Serialize a record and append the record separator.
///
/// # Errors
///
/// Returns an error if the record cannot be serialized.
pub fn frame_record<T: Serialize>(record: &T) -> Result<String, serde_json::Error> {
    let mut text = serde_json::to_string(record)?;
    text.push(RECORD_SEPARATOR);
    Ok(text)
}

// =============================================================================
// Inbound Records
// =============================================================================

/// Envelope of an inbound record.
///
/// Only the fields the relay acts on are modelled; everything else
/// (`invocationId`, `headers`, ...) is skipped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEnvelope {
    /// Record type.
    #[serde(rename = "type", default)]
    pub kind: Option<i64>,
    /// Topic of an invocation.
    #[serde(default)]
    pub target: Option<String>,
    /// Invocation arguments.
    #[serde(default)]
    pub arguments: Option<Vec<Value>>,
}
