//! Frame Codec
//!
//! Decodes upstream WebSocket messages into topic updates.
//!
//! A message is split on the record separator, each record is parsed as an
//! [`InboundEnvelope`], and invocation records have their payload extracted:
//!
//! ```text
//! arguments[0] ──base64──► gzip bytes ──gunzip──► JSON text ──parse──► Value
//! ```
//!
//! Decoding failures are contained to the record they occur in: a bad record
//! is logged and counted, and its siblings in the same message still decode.

use std::io::Read;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use flate2::read::MultiGzDecoder;
use serde_json::Value;

use super::messages::{InboundEnvelope, RECORD_SEPARATOR, TYPE_INVOCATION, TYPE_PING};
use crate::domain::topic::TopicUpdate;
use crate::infrastructure::metrics::{self, RecordKind};

/// Standard alphabet, padding optional on decode.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Record is not a JSON envelope.
    #[error("invalid envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// First invocation argument is not a string.
    #[error("payload argument is not a string")]
    PayloadNotString,

    /// Payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Payload is not a valid gzip stream.
    #[error("invalid gzip payload: {0}")]
    Decompress(#[from] std::io::Error),

    /// Decompressed payload is not valid JSON.
    #[error("invalid JSON payload: {0}")]
    Json(#[source] serde_json::Error),
}

impl CodecError {
    /// Short label used for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Envelope(_) => "envelope",
            Self::PayloadNotString => "payload_type",
            Self::Base64(_) => "base64",
            Self::Decompress(_) => "gzip",
            Self::Json(_) => "json",
        }
    }
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Keep-alive.
    Ping,
    /// Invocation carrying a topic payload.
    Data(TopicUpdate),
    /// Any other record (handshake ack, completion, unknown type).
    Ignored,
}

/// Codec for the upstream hub protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Split a message into its non-empty records.
    pub fn split(text: &str) -> impl Iterator<Item = &str> {
        text.split(RECORD_SEPARATOR)
            .filter(|record| !record.is_empty())
    }

    /// Decode every record of a message, keeping only topic updates.
    ///
    /// Records that fail to decode are logged and counted, never propagated.
    #[must_use]
    pub fn decode(&self, text: &str) -> Vec<TopicUpdate> {
        let mut updates = Vec::new();

        for record in Self::split(text) {
            match self.decode_record(record) {
                Ok(Record::Data(update)) => {
                    metrics::record_upstream_record(RecordKind::Data);
                    updates.push(update);
                }
                Ok(Record::Ping) => {
                    metrics::record_upstream_record(RecordKind::Ping);
                }
                Ok(Record::Ignored) => {
                    metrics::record_upstream_record(RecordKind::Ignored);
                    tracing::trace!("Ignoring upstream record");
                }
                Err(e) => {
                    metrics::record_malformed_record(e.kind());
                    tracing::warn!(error = %e, "Dropping malformed upstream record");
                }
            }
        }

        updates
    }

    /// Decode a single record (without its separator).
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope or the payload of an invocation
    /// cannot be decoded.
    pub fn decode_record(&self, record: &str) -> Result<Record, CodecError> {
        let envelope: InboundEnvelope =
            serde_json::from_str(record).map_err(CodecError::Envelope)?;

        match envelope.kind {
            Some(TYPE_PING) => Ok(Record::Ping),
            Some(TYPE_INVOCATION) => {
                let (Some(target), Some(arguments)) = (envelope.target, envelope.arguments) else {
                    return Ok(Record::Ignored);
                };
                let Some(first) = arguments.into_iter().next() else {
                    return Ok(Record::Ignored);
                };
                let Value::String(encoded) = first else {
                    return Err(CodecError::PayloadNotString);
                };

                let payload = self.decode_payload(&encoded)?;
                Ok(Record::Data(TopicUpdate::new(target, payload)))
            }
            _ => Ok(Record::Ignored),
        }
    }

    /// Decode a base64 gzip-compressed JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error at the first failing stage (base64, gzip, JSON).
    pub fn decode_payload(&self, encoded: &str) -> Result<Value, CodecError> {
        let compressed = PAYLOAD_ENGINE.decode(encoded.trim())?;

        let mut json = Vec::new();
        MultiGzDecoder::new(compressed.as_slice()).read_to_end(&mut json)?;

        serde_json::from_slice(&json).map_err(CodecError::Json)
    }
}
