//! Shopify Admin API access.
//!
//! Reconciliation depends only on the [`SubscriptionApi`] trait so it can run
//! against the real Admin API ([`ShopifyClient`]) or an in-memory double.

mod shopify;

pub use shopify::ShopifyClient;

use crate::Result;
use crate::models::{NewSubscription, Subscription};

/// Remote webhook subscription store.
///
/// Both calls may fail with transport or authentication errors, which are
/// returned unmodified.
pub trait SubscriptionApi: Send + Sync {
    /// Lists every webhook subscription registered for the shop.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    fn list_subscriptions(&self) -> Result<Vec<Subscription>>;

    /// Creates a webhook subscription.
    ///
    /// The returned record's `created_at` is set when the platform accepted
    /// the registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    fn create_subscription(&self, request: &NewSubscription) -> Result<Subscription>;
}
