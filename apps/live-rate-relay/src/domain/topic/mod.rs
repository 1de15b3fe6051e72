//! Topic Types
//!
//! A topic names one category of data published by the upstream feed.
//! The known set is small and fixed, but topics travel as open strings so
//! a new upstream target never breaks decoding.
//!
//! # Classification
//!
//! - **Metadata** topics change rarely. They are cached and handed to
//!   subscribers as part of the initial snapshot only.
//! - **Live** topics are cached, timestamped and pushed to every subscriber
//!   as soon as they arrive.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Topic
// =============================================================================

/// Name of an upstream data category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Contact details of the rate publisher.
    pub const CONTACT_DETAILS: &'static str = "contactDetails";
    /// Reference details (product list, display settings).
    pub const REFERENCE_DETAILS: &'static str = "referanceDetails";
    /// Live rate stream.
    pub const LIVE_RATES: &'static str = "workerPublish";
    /// Live coin rate stream.
    pub const COIN_RATES: &'static str = "workerPublishCoin";

    /// Create a topic from any string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The topic name as sent by the upstream feed.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the topic.
    #[must_use]
    pub fn kind(&self) -> TopicKind {
        match self.0.as_str() {
            Self::CONTACT_DETAILS => TopicKind::Metadata(MetadataSlot::ContactDetails),
            Self::REFERENCE_DETAILS => TopicKind::Metadata(MetadataSlot::ReferenceDetails),
            Self::LIVE_RATES => TopicKind::Live(LiveSlot::Rates),
            Self::COIN_RATES => TopicKind::Live(LiveSlot::Coins),
            _ => TopicKind::Unknown,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A decoded payload for one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicUpdate {
    /// Topic the payload was published under.
    pub topic: Topic,
    /// Decoded JSON payload.
    pub payload: Value,
}

impl TopicUpdate {
    /// Create a new update.
    #[must_use]
    pub fn new(topic: impl Into<Topic>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// How a topic is handled after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// Cached only.
    Metadata(MetadataSlot),
    /// Cached, timestamped and broadcast.
    Live(LiveSlot),
    /// Not relayed.
    Unknown,
}

/// Cache slot for a metadata topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSlot {
    /// `contactDetails`.
    ContactDetails,
    /// `referanceDetails`.
    ReferenceDetails,
}

/// Cache slot for a live topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveSlot {
    /// `workerPublish`, cached as `liveRates`.
    Rates,
    /// `workerPublishCoin`.
    Coins,
}

impl LiveSlot {
    /// Metric label for this slot.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rates => "rates",
            Self::Coins => "coins",
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("contactDetails", TopicKind::Metadata(MetadataSlot::ContactDetails))]
    #[test_case("referanceDetails", TopicKind::Metadata(MetadataSlot::ReferenceDetails))]
    #[test_case("workerPublish", TopicKind::Live(LiveSlot::Rates))]
    #[test_case("workerPublishCoin", TopicKind::Live(LiveSlot::Coins))]
    #[test_case("workerPublishSilver", TopicKind::Unknown)]
    #[test_case("", TopicKind::Unknown)]
    fn classifies_topics(name: &str, expected: TopicKind) {
        assert_eq!(Topic::from(name).kind(), expected);
    }

    #[test]
    fn classification_is_case_sensitive() {
        assert_eq!(Topic::from("WorkerPublish").kind(), TopicKind::Unknown);
    }

    #[test]
    fn serializes_as_plain_string() {
        let topic = Topic::from(Topic::COIN_RATES);
        assert_eq!(
            serde_json::to_string(&topic).unwrap(),
            "\"workerPublishCoin\""
        );
        assert_eq!(topic.to_string(), "workerPublishCoin");
    }
}
