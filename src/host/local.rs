//! In-process host runtime.

use super::{EventHandle, EventHandler, Host};
use crate::models::{EventContext, Topic};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Host runtime that keeps bindings in memory and runs handlers inline.
#[derive(Default)]
pub struct LocalHost {
    /// Registered events (event id → topic).
    events: RwLock<HashMap<String, Topic>>,
    /// Bound handlers (event id → handler).
    handlers: RwLock<HashMap<String, Arc<dyn EventHandler>>>,
    /// HTTP delegates (path → connector id).
    delegates: RwLock<BTreeMap<String, String>>,
}

impl LocalHost {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the topic registered for `event_id`.
    #[must_use]
    pub fn event_topic(&self, event_id: &str) -> Option<Topic> {
        self.events
            .read()
            .ok()
            .and_then(|events| events.get(event_id).cloned())
    }

    /// Returns the connector id delegated to handle `path`.
    #[must_use]
    pub fn delegate_for(&self, path: &str) -> Option<String> {
        self.delegates
            .read()
            .ok()
            .and_then(|delegates| delegates.get(path).cloned())
    }

    /// Returns every delegated path.
    #[must_use]
    pub fn delegated_paths(&self) -> Vec<String> {
        self.delegates
            .read()
            .map(|delegates| delegates.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns true when a handler is bound to `event_id`.
    #[must_use]
    pub fn is_bound(&self, event_id: &str) -> bool {
        self.handlers
            .read()
            .is_ok_and(|handlers| handlers.contains_key(event_id))
    }
}

fn lock_error(operation: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "host registry lock poisoned".to_string(),
    }
}

impl Host for LocalHost {
    fn register_event(&self, event_id: &str, topic: &Topic) -> Result<EventHandle> {
        self.events
            .write()
            .map_err(|_| lock_error("register_event"))?
            .insert(event_id.to_string(), topic.clone());
        Ok(EventHandle::new(event_id))
    }

    fn bind_handler(&self, handle: &EventHandle, handler: Arc<dyn EventHandler>) -> Result<()> {
        self.handlers
            .write()
            .map_err(|_| lock_error("bind_handler"))?
            .insert(handle.event_id().to_string(), handler);
        Ok(())
    }

    fn register_http_delegate(&self, path: &str, connector_id: &str) -> Result<()> {
        let mut delegates = self
            .delegates
            .write()
            .map_err(|_| lock_error("register_http_delegate"))?;

        if let Some(existing) = delegates.get(path)
            && existing != connector_id
        {
            tracing::warn!(
                path,
                existing = %existing,
                connector_id,
                "HTTP delegate path reassigned to another connector"
            );
        }
        delegates.insert(path.to_string(), connector_id.to_string());
        Ok(())
    }

    fn dispatch_event(&self, event_id: &str, context: &EventContext) -> Result<bool> {
        // Clone out of the lock so a handler may call back into the host.
        let handler = self
            .handlers
            .read()
            .map_err(|_| lock_error("dispatch_event"))?
            .get(event_id)
            .cloned();

        let Some(handler) = handler else {
            tracing::warn!(event_id, "No handler bound for event");
            return Ok(false);
        };

        handler.handle(context).map_err(|err| match err {
            failure @ Error::HandlerFailure { .. } => failure,
            other => Error::HandlerFailure {
                event_id: event_id.to_string(),
                cause: other.to_string(),
            },
        })?;

        Ok(true)
    }
}
