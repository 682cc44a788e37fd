//! Inbound delivery routing.
//!
//! Each delivery is matched on its topic against the registry and handed to
//! every matching event's handler, in registration order. The first handler
//! failure stops the fan-out.

use super::registry::{DesiredEvent, EventRegistry};
use crate::Result;
use crate::host::Host;
use crate::models::{EventContext, Notification};
use serde_json::Value;
use std::time::Instant;

/// Routes deliveries to the handlers declared for their topic.
pub struct InboundDispatcher<'a> {
    registry: &'a EventRegistry,
    host: &'a dyn Host,
}

impl<'a> InboundDispatcher<'a> {
    /// Creates a dispatcher over a registry and the host that runs handlers.
    #[must_use]
    pub fn new(registry: &'a EventRegistry, host: &'a dyn Host) -> Self {
        Self { registry, host }
    }

    /// Dispatches one delivery.
    ///
    /// Returns `Ok(true)` once every matching handler has run, including when
    /// nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::HandlerFailure`] from the first handler that
    /// fails; later handlers are not invoked.
    pub fn dispatch(&self, notification: &Notification) -> Result<bool> {
        let topic = notification.topic.as_str();
        let shop = notification.shop_domain.as_deref().unwrap_or("");
        let events = self.registry.events_for_topic(topic);

        // Only declared topics become label values; the header is untrusted.
        if events.is_empty() {
            metrics::counter!("webhook_deliveries_received_total", "matched" => "false")
                .increment(1);
            tracing::debug!(topic, shop, "No events declared for delivery topic");
            return Ok(true);
        }
        metrics::counter!(
            "webhook_deliveries_received_total",
            "matched" => "true",
            "topic" => topic.to_string()
        )
        .increment(1);

        let start = Instant::now();
        for event in events {
            let context = build_context(event, notification);
            match self.host.dispatch_event(event.id(), &context) {
                Ok(true) => {
                    metrics::counter!("webhook_handler_invocations_total", "status" => "success")
                        .increment(1);
                    tracing::debug!(event_id = event.id(), topic, shop, "Handler completed");
                },
                Ok(false) => {
                    metrics::counter!("webhook_handler_invocations_total", "status" => "unbound")
                        .increment(1);
                },
                Err(e) => {
                    metrics::counter!("webhook_handler_invocations_total", "status" => "failure")
                        .increment(1);
                    tracing::error!(
                        event_id = event.id(),
                        topic,
                        shop,
                        error = %e,
                        "Handler failed, remaining handlers skipped"
                    );
                    return Err(e);
                },
            }
        }

        metrics::histogram!("webhook_dispatch_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        Ok(true)
    }
}

/// Builds the context handed to one event's handler.
///
/// Layers, later overriding earlier: the event's declared fields, the
/// delivery body's top-level fields, then `topic`. A body that is not an
/// object is placed under `body`.
#[must_use]
pub fn build_context(event: &DesiredEvent, notification: &Notification) -> EventContext {
    let mut context = event.declared_fields();

    match &notification.body {
        Value::Object(fields) => {
            context.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        },
        Value::Null => {},
        other => {
            context.insert("body".to_string(), other.clone());
        },
    }

    context.insert(
        "topic".to_string(),
        Value::String(notification.topic.clone()),
    );
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{EventHandler, LocalHost};
    use crate::models::Topic;
    use crate::Error;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<String>>>;

    fn recording(label: &str, calls: &Calls) -> Arc<dyn EventHandler> {
        let label = label.to_string();
        let calls = Arc::clone(calls);
        Arc::new(move |_: &EventContext| -> Result<()> {
            calls.lock().expect("lock").push(label.clone());
            Ok(())
        })
    }

    fn declare(
        registry: &mut EventRegistry,
        host: &LocalHost,
        topic: &str,
        id: &str,
        handler: Arc<dyn EventHandler>,
    ) {
        let topic = Topic::new(topic).expect("topic");
        let event = registry.register(topic.clone(), Arc::clone(&handler), Some(id.to_string()));
        let handle = host.register_event(event.id(), &topic).expect("register");
        host.bind_handler(&handle, handler).expect("bind");
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let calls = Calls::default();
        let host = LocalHost::new();
        let mut registry = EventRegistry::new("c1", "/hooks");
        declare(&mut registry, &host, "orders/create", "e1", recording("E1", &calls));
        declare(&mut registry, &host, "orders/create", "e2", recording("E2", &calls));
        declare(&mut registry, &host, "orders/paid", "x", recording("X", &calls));
        declare(&mut registry, &host, "orders/create", "e3", recording("E3", &calls));

        let dispatcher = InboundDispatcher::new(&registry, &host);
        let handled = dispatcher
            .dispatch(&Notification::new("orders/create", json!({"id": 1})))
            .expect("dispatch");

        assert!(handled);
        assert_eq!(*calls.lock().expect("lock"), vec!["E1", "E2", "E3"]);
    }

    #[test]
    fn test_no_match_still_completes() {
        let calls = Calls::default();
        let host = LocalHost::new();
        let mut registry = EventRegistry::new("c1", "/hooks");
        declare(&mut registry, &host, "orders/create", "e1", recording("E1", &calls));

        let dispatcher = InboundDispatcher::new(&registry, &host);
        let handled = dispatcher
            .dispatch(&Notification::new("carts/update", json!({})))
            .expect("dispatch");

        assert!(handled);
        assert!(calls.lock().expect("lock").is_empty());
    }

    #[test]
    fn test_handler_failure_aborts_remaining() {
        let calls = Calls::default();
        let host = LocalHost::new();
        let mut registry = EventRegistry::new("c1", "/hooks");
        declare(&mut registry, &host, "orders/create", "e1", recording("E1", &calls));
        declare(
            &mut registry,
            &host,
            "orders/create",
            "e2",
            Arc::new(|_: &EventContext| -> Result<()> {
                Err(Error::InvalidInput("missing line items".to_string()))
            }),
        );
        declare(&mut registry, &host, "orders/create", "e3", recording("E3", &calls));

        let dispatcher = InboundDispatcher::new(&registry, &host);
        let err = dispatcher
            .dispatch(&Notification::new("orders/create", json!({})))
            .expect_err("second handler fails");

        assert!(matches!(err, Error::HandlerFailure { ref event_id, .. } if event_id == "e2"));
        assert_eq!(*calls.lock().expect("lock"), vec!["E1"]);
    }

    #[test]
    fn test_context_precedence() {
        let mut registry = EventRegistry::new("c1", "/hooks");
        let noop: Arc<dyn EventHandler> = Arc::new(|_: &EventContext| -> Result<()> { Ok(()) });
        let event = registry.register(
            Topic::new("orders/create").expect("topic"),
            noop,
            Some("e1".to_string()),
        );

        let body = json!({"id": 42, "topic": "spoofed", "total_price": "10.00"});
        let context = build_context(&event, &Notification::new("orders/create", body));

        assert_eq!(context["id"], 42);
        assert_eq!(context["topic"], "orders/create");
        assert_eq!(context["total_price"], "10.00");
        assert_eq!(context["connector_id"], "c1");
        assert_eq!(context["options"]["topic"], "orders/create");
    }

    #[test]
    fn test_non_object_body_is_nested() {
        let mut registry = EventRegistry::new("c1", "/hooks");
        let noop: Arc<dyn EventHandler> = Arc::new(|_: &EventContext| -> Result<()> { Ok(()) });
        let event = registry.register(Topic::new("orders/create").expect("topic"), noop, None);

        let context = build_context(&event, &Notification::new("orders/create", json!([1, 2])));
        assert_eq!(context["body"], json!([1, 2]));

        let context = build_context(&event, &Notification::new("orders/create", Value::Null));
        assert!(!context.contains_key("body"));
    }

    #[test]
    fn test_unmatched_topics_share_one_series() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let host = LocalHost::new();
        let calls = Calls::default();
        let mut registry = EventRegistry::new("c1", "/hooks");
        declare(&mut registry, &host, "orders/create", "E1", recording("E1", &calls));
        let dispatcher = InboundDispatcher::new(&registry, &host);

        metrics::with_local_recorder(&recorder, || {
            for i in 0..50 {
                let junk = Notification::new(format!("junk/{i}"), json!({}));
                assert!(dispatcher.dispatch(&junk).expect("dispatch"));
            }
            dispatcher
                .dispatch(&Notification::new("orders/create", json!({})))
                .expect("dispatch");
        });

        let rendered = handle.render();
        let series: Vec<&str> = rendered
            .lines()
            .filter(|l| l.starts_with("webhook_deliveries_received_total{"))
            .collect();
        assert_eq!(series.len(), 2, "{rendered}");
        assert!(!rendered.contains("junk/"));
        assert!(rendered.contains(r#"topic="orders/create""#));
    }
}
