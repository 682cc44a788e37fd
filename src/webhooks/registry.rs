//! Declared events and their topics.

use crate::host::EventHandler;
use crate::models::{EventContext, Topic};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A local event declared for a webhook topic.
///
/// Immutable once created; registering the same id again replaces it.
#[derive(Clone)]
pub struct DesiredEvent {
    id: String,
    topic: Topic,
    connector_id: String,
    handler: Arc<dyn EventHandler>,
}

impl DesiredEvent {
    /// Returns the event id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the topic.
    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Returns the id of the connector that declared this event.
    #[must_use]
    pub fn connector_id(&self) -> &str {
        &self.connector_id
    }

    /// Returns the handler.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn EventHandler> {
        Arc::clone(&self.handler)
    }

    /// Returns the event's own fields, the base layer of a handler context.
    #[must_use]
    pub fn declared_fields(&self) -> EventContext {
        let mut fields = EventContext::new();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        fields.insert(
            "connector_id".to_string(),
            Value::String(self.connector_id.clone()),
        );
        fields.insert("options".to_string(), json!({ "topic": self.topic.as_str() }));
        fields
    }
}

impl fmt::Debug for DesiredEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DesiredEvent")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("connector_id", &self.connector_id)
            .finish_non_exhaustive()
    }
}

/// Events declared by one connector instance, in registration order.
#[derive(Debug)]
pub struct EventRegistry {
    connector_id: String,
    webhook_path: String,
    events: Vec<DesiredEvent>,
}

impl EventRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(connector_id: impl Into<String>, webhook_path: impl Into<String>) -> Self {
        Self {
            connector_id: connector_id.into(),
            webhook_path: webhook_path.into(),
            events: Vec::new(),
        }
    }

    /// Derives the id used when a declaration does not name one.
    ///
    /// Deterministic in the webhook path, topic and connector id, so
    /// repeating a declaration replaces the earlier one.
    #[must_use]
    pub fn synthesize_id(&self, topic: &Topic) -> String {
        format!("Shopify{}/{topic}/{}", self.webhook_path, self.connector_id)
    }

    /// Declares interest in `topic`.
    ///
    /// An existing entry with the same id is replaced in place, keeping its
    /// original position.
    pub fn register(
        &mut self,
        topic: Topic,
        handler: Arc<dyn EventHandler>,
        event_id: Option<String>,
    ) -> DesiredEvent {
        let id = event_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.synthesize_id(&topic));

        let event = DesiredEvent {
            id,
            topic,
            connector_id: self.connector_id.clone(),
            handler,
        };

        match self.events.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => {
                tracing::debug!(event_id = %event.id, topic = %event.topic, "Replacing event declaration");
                *existing = event.clone();
            },
            None => {
                tracing::debug!(event_id = %event.id, topic = %event.topic, "Registering event");
                self.events.push(event.clone());
            },
        }

        event
    }

    /// Returns every distinct declared topic.
    #[must_use]
    pub fn all_topics(&self) -> BTreeSet<Topic> {
        self.events.iter().map(|e| e.topic.clone()).collect()
    }

    /// Returns the events declared for `topic`, in registration order.
    ///
    /// Matching is exact and case-sensitive.
    #[must_use]
    pub fn events_for_topic(&self, topic: &str) -> Vec<&DesiredEvent> {
        self.events
            .iter()
            .filter(|e| e.topic.as_str() == topic)
            .collect()
    }

    /// Returns the event with `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&DesiredEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    /// Iterates events in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &DesiredEvent> {
        self.events.iter()
    }

    /// Returns the number of declared events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true when nothing has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
