//! Inbound webhook deliveries.

use serde_json::{Map, Value};

/// Request header carrying the delivery's topic.
pub const TOPIC_HEADER: &str = "x-shopify-topic";

/// Request header carrying the delivery's HMAC signature.
pub const HMAC_HEADER: &str = "x-shopify-hmac-sha256";

/// Request header carrying the originating shop domain.
pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";

/// Context handed to a local handler for one delivery.
pub type EventContext = Map<String, Value>;

/// One inbound webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Topic extracted from the delivery metadata.
    pub topic: String,
    /// Parsed request body.
    pub body: Value,
    /// Shop that sent the delivery, when known.
    pub shop_domain: Option<String>,
}

impl Notification {
    /// Creates a notification from a topic and body.
    #[must_use]
    pub fn new(topic: impl Into<String>, body: Value) -> Self {
        Self {
            topic: topic.into(),
            body,
            shop_domain: None,
        }
    }

    /// Sets the originating shop domain.
    #[must_use]
    pub fn with_shop_domain(mut self, domain: impl Into<String>) -> Self {
        self.shop_domain = Some(domain.into());
        self
    }
}
