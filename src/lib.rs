//! # Shopify Connector
//!
//! Bridges Shopify webhook notifications to local event handlers.
//!
//! A [`ShopifyConnector`](webhooks::ShopifyConnector) does two things:
//!
//! - On startup it reconciles the topics declared through
//!   [`on`](webhooks::ShopifyConnector::on) against the webhook subscriptions
//!   already registered with Shopify, creating only the missing ones.
//! - At runtime it routes every inbound delivery to each handler registered
//!   for the delivery's topic, in registration order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use shopify_connector::config::ConnectorConfig;
//! use shopify_connector::host::{LocalHost, LoggingHandler};
//! use shopify_connector::webhooks::ShopifyConnector;
//!
//! let config = ConnectorConfig::load_default()?;
//! let mut connector = ShopifyConnector::from_config(config, Arc::new(LocalHost::new()))?;
//! connector.on("orders/create".parse()?, Arc::new(LoggingHandler), None)?;
//! let report = connector.start()?;
//! for (topic, reason) in report.failed() {
//!     eprintln!("{topic}: {reason}");
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod client;
pub mod config;
pub mod host;
pub mod models;
pub mod observability;
pub mod webhooks;

// Re-exports for convenience
pub use client::{ShopifyClient, SubscriptionApi};
pub use config::ConnectorConfig;
pub use host::{EventHandler, Host, LocalHost};
pub use models::{EventContext, Notification, NewSubscription, Subscription, Topic};
pub use webhooks::{
    EventRegistry, InboundDispatcher, ReconciliationReport, ShopifyConnector, TopicOutcome,
    WebhookReconciler,
};

/// Error type for connector operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidConfiguration` | Malformed base URL, missing credentials |
/// | `RemoteListFailure` | Listing existing webhook subscriptions fails |
/// | `RemoteCreateFailure` | A subscription create fails and the caller escalates it |
/// | `HandlerFailure` | A local handler fails while processing a delivery |
/// | `InvalidInput` | Empty topic names, malformed inbound requests |
/// | `OperationFailed` | I/O errors, HTTP transport errors, serialization errors |
/// | `FeatureNotEnabled` | Using features requiring compile-time flags |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The connector configuration is invalid.
    ///
    /// Raised before any remote call is made, so startup can fail fast.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Listing the existing remote subscriptions failed.
    ///
    /// Fatal to reconciliation.
    #[error("failed to list webhook subscriptions: {cause}")]
    RemoteListFailure {
        /// The underlying cause.
        cause: String,
    },

    /// Creating a remote subscription failed.
    ///
    /// Reconciliation records these per topic; this variant only surfaces
    /// when a caller escalates a report with
    /// [`ReconciliationReport::into_result`].
    #[error("failed to create webhook subscription for topic '{topic}': {cause}")]
    RemoteCreateFailure {
        /// Topic that could not be registered.
        topic: String,
        /// The underlying cause.
        cause: String,
    },

    /// A local handler failed while processing a delivery.
    #[error("handler for event '{event_id}' failed: {cause}")]
    HandlerFailure {
        /// Event whose handler failed.
        event_id: String,
        /// The underlying cause.
        cause: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, Error>;
