//! Data models for the connector.
//!
//! Remote subscription records, topics and inbound deliveries.

mod notification;
mod subscription;
mod topic;

pub use notification::{
    EventContext, HMAC_HEADER, Notification, SHOP_DOMAIN_HEADER, TOPIC_HEADER,
};
pub use subscription::{NewSubscription, Subscription};
pub use topic::Topic;
