//! Host runtime seam.
//!
//! The connector does not own handler storage or the HTTP listener; it asks a
//! [`Host`] to bind events to handlers, to route a webhook path to it, and to
//! run a handler for a given event id. [`LocalHost`] is the in-process
//! implementation used by the binary and tests.

mod local;

pub use local::LocalHost;

use crate::Result;
use crate::models::{EventContext, Topic};
use std::sync::Arc;

/// A local callback invoked for each matching delivery.
///
/// Closures of the form `Fn(&EventContext) -> Result<()>` implement this
/// trait directly.
pub trait EventHandler: Send + Sync {
    /// Handles one delivery.
    ///
    /// # Errors
    ///
    /// Any error aborts the remaining handlers for the same delivery.
    fn handle(&self, context: &EventContext) -> Result<()>;
}

impl<F> EventHandler for F
where
    F: Fn(&EventContext) -> Result<()> + Send + Sync,
{
    fn handle(&self, context: &EventContext) -> Result<()> {
        self(context)
    }
}

/// Handler that records each delivery as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, context: &EventContext) -> Result<()> {
        let event_id = context.get("id").and_then(|v| v.as_str()).unwrap_or("");
        let topic = context.get("topic").and_then(|v| v.as_str()).unwrap_or("");
        let resource_id = context.get("admin_graphql_api_id").and_then(|v| v.as_str());

        tracing::info!(
            event_id,
            topic,
            resource_id = ?resource_id,
            fields = context.len(),
            "Webhook delivery received"
        );
        Ok(())
    }
}

/// Identifies an event registered with a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventHandle {
    event_id: String,
}

impl EventHandle {
    /// Creates a handle for an event id.
    #[must_use]
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
        }
    }

    /// Returns the event id.
    #[must_use]
    pub fn event_id(&self) -> &str {
        &self.event_id
    }
}

/// Registration and dispatch primitives offered by the host runtime.
pub trait Host: Send + Sync {
    /// Registers an event and its topic descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot record the event.
    fn register_event(&self, event_id: &str, topic: &Topic) -> Result<EventHandle>;

    /// Binds a handler to a registered event, replacing any earlier binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot record the binding.
    fn bind_handler(&self, handle: &EventHandle, handler: Arc<dyn EventHandler>) -> Result<()>;

    /// Routes inbound HTTP requests on `path` to the connector `connector_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot record the delegate.
    fn register_http_delegate(&self, path: &str, connector_id: &str) -> Result<()>;

    /// Runs the handler bound to `event_id`.
    ///
    /// Returns `Ok(false)` when no handler is bound.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::HandlerFailure`] if the handler fails.
    fn dispatch_event(&self, event_id: &str, context: &EventContext) -> Result<bool>;
}
