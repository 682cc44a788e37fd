//! Remote webhook subscription records.

use super::Topic;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A webhook subscription as registered with Shopify.
///
/// Owned by the platform; the connector only reads these and creates new ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Platform-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Callback URL deliveries are sent to.
    pub address: String,

    /// Topic the subscription listens to.
    pub topic: Topic,

    /// Creation timestamp. Its presence signals a successful registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<FixedOffset>>,

    /// Payload format (`json` or `xml`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Subscription {
    /// Returns true when this subscription delivers `topic` to `address`.
    ///
    /// Both fields must match; `(address, topic)` is the dedup key.
    #[must_use]
    pub fn matches(&self, address: &str, topic: &Topic) -> bool {
        self.address == address && &self.topic == topic
    }
}

/// Request body for creating a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscription {
    /// Callback URL deliveries are sent to.
    pub address: String,
    /// Topic to subscribe to.
    pub topic: Topic,
    /// Payload format requested from the platform.
    pub format: String,
}

impl NewSubscription {
    /// Creates a JSON-format subscription request.
    #[must_use]
    pub fn new(address: impl Into<String>, topic: Topic) -> Self {
        Self {
            address: address.into(),
            topic,
            format: "json".to_string(),
        }
    }
}
