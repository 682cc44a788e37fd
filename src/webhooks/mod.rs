//! Shopify webhook connector.
//!
//! # Architecture
//!
//! ```text
//!             on(topic, handler)
//! caller ---------------------------> EventRegistry ----> Host (bind)
//!   |
//!   | start()
//!   v
//! WebhookReconciler --list/create--> SubscriptionApi (Shopify Admin API)
//!
//! Shopify --POST webhook_path--> server --> ShopifyConnector::handle
//!                                               |
//!                                               v
//!                                     InboundDispatcher --> Host::dispatch_event
//! ```
//!
//! # Lifecycle
//!
//! 1. Topics are declared with [`ShopifyConnector::on`]
//! 2. [`ShopifyConnector::start`] creates the missing remote subscriptions
//! 3. Each delivery is routed by topic to the declared handlers, in order

mod connector;
mod dispatcher;
mod reconciler;
mod registry;
pub mod server;
mod signature;

pub use connector::ShopifyConnector;
pub use dispatcher::{InboundDispatcher, build_context};
pub use reconciler::{ReconciliationReport, TopicOutcome, WebhookReconciler};
pub use registry::{DesiredEvent, EventRegistry};
pub use signature::{compute_signature, verify_signature};
