//! The connector facade.

use super::dispatcher::InboundDispatcher;
use super::reconciler::{ReconciliationReport, WebhookReconciler};
use super::registry::{DesiredEvent, EventRegistry};
use super::signature::verify_signature;
use crate::Result;
use crate::client::{ShopifyClient, SubscriptionApi};
use crate::config::{ConnectorConfig, validate_webhook_path};
use crate::host::{EventHandler, Host};
use crate::models::{Notification, Topic};
use secrecy::ExposeSecret;
use std::sync::Arc;

/// Connects one Shopify store to local event handlers.
///
/// Declare topics with [`on`](Self::on), call [`start`](Self::start) once to
/// reconcile remote subscriptions, then feed deliveries to
/// [`handle`](Self::handle). After `start` the connector is read-only and
/// can be shared behind an `Arc`.
pub struct ShopifyConnector {
    id: String,
    config: ConnectorConfig,
    api: Arc<dyn SubscriptionApi>,
    host: Arc<dyn Host>,
    registry: EventRegistry,
}

impl ShopifyConnector {
    /// Creates a connector with a random instance id.
    #[must_use]
    pub fn new(config: ConnectorConfig, api: Arc<dyn SubscriptionApi>, host: Arc<dyn Host>) -> Self {
        Self::with_id(config, api, host, uuid::Uuid::new_v4().to_string())
    }

    /// Creates a connector with an explicit instance id.
    #[must_use]
    pub fn with_id(
        config: ConnectorConfig,
        api: Arc<dyn SubscriptionApi>,
        host: Arc<dyn Host>,
        id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let registry = EventRegistry::new(id.clone(), config.webhook_path());
        Self {
            id,
            config,
            api,
            host,
            registry,
        }
    }

    /// Creates a connector that talks to the Shopify Admin API.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfiguration`] if the webhook path is
    /// invalid or the shop name or credentials are missing.
    pub fn from_config(config: ConnectorConfig, host: Arc<dyn Host>) -> Result<Self> {
        validate_webhook_path(config.webhook_path())?;
        let client = ShopifyClient::from_config(&config.shop)?;
        Ok(Self::new(config, Arc::new(client), host))
    }

    /// Returns the connector instance id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Returns the declared events.
    #[must_use]
    pub const fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Returns the subscription API client for direct use.
    #[must_use]
    pub fn sdk(&self) -> &dyn SubscriptionApi {
        self.api.as_ref()
    }

    /// Returns the path inbound deliveries are received on.
    #[must_use]
    pub fn webhook_path(&self) -> &str {
        self.config.webhook_path()
    }

    /// Returns the address subscriptions are registered against.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfiguration`] if the base URL is
    /// missing or malformed.
    pub fn callback_address(&self) -> Result<String> {
        self.config.callback_address()
    }

    /// Declares interest in `topic`, routing its deliveries to `handler`.
    ///
    /// Without an `event_id` the id is derived from the webhook path, topic
    /// and connector id, so declaring the same topic twice replaces the
    /// earlier handler. The event is also registered with the host, and the
    /// webhook path is delegated to this connector.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the registration; the event is
    /// then not declared.
    pub fn on(
        &mut self,
        topic: Topic,
        handler: Arc<dyn EventHandler>,
        event_id: Option<String>,
    ) -> Result<DesiredEvent> {
        let id = event_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.registry.synthesize_id(&topic));

        // The registry only learns of events the host has accepted.
        let handle = self.host.register_event(&id, &topic)?;
        self.host.bind_handler(&handle, Arc::clone(&handler))?;
        self.host
            .register_http_delegate(self.config.webhook_path(), &self.id)?;

        let event = self.registry.register(topic, handler, Some(id));

        tracing::info!(
            connector_id = %self.id,
            event_id = event.id(),
            topic = %event.topic(),
            "Declared webhook event"
        );
        Ok(event)
    }

    /// Declares every `[[events]]` entry from the configuration with `handler`.
    ///
    /// Returns the number of events declared.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects a registration.
    pub fn declare_configured(&mut self, handler: &Arc<dyn EventHandler>) -> Result<usize> {
        let declarations = self.config.events.clone();
        for declaration in &declarations {
            self.on(
                declaration.topic.clone(),
                Arc::clone(handler),
                declaration.id.clone(),
            )?;
        }
        Ok(declarations.len())
    }

    /// Reconciles remote subscriptions with the declared topics.
    ///
    /// Create failures are reported per topic; with `fail_on_create_error`
    /// configured they are escalated to an error instead.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfiguration`] for a bad base URL,
    /// [`crate::Error::RemoteListFailure`] if listing fails, or
    /// [`crate::Error::RemoteCreateFailure`] in strict mode.
    pub fn start(&self) -> Result<ReconciliationReport> {
        self.reconcile_topics(&[], self.config.fail_on_create_error)
    }

    /// Reconciles the declared topics plus `extra` topics.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start), with `strict` controlling escalation.
    pub fn reconcile_topics(&self, extra: &[Topic], strict: bool) -> Result<ReconciliationReport> {
        let mut desired = self.registry.all_topics();
        desired.extend(extra.iter().cloned());

        let report = WebhookReconciler::new(Arc::clone(&self.api)).reconcile(
            &desired,
            self.config.base_url.as_deref(),
            self.config.webhook_path(),
        )?;

        tracing::info!(
            connector_id = %self.id,
            created = report.created().len(),
            reused = report.reused().len(),
            failed = report.failed().len(),
            stale = report.stale.len(),
            "Webhook reconciliation finished"
        );
        report.into_result(strict)
    }

    /// Routes one inbound delivery to the matching handlers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::HandlerFailure`] if a handler fails.
    pub fn handle(&self, notification: &Notification) -> Result<bool> {
        InboundDispatcher::new(&self.registry, self.host.as_ref()).dispatch(notification)
    }

    /// Returns true when deliveries must carry a signature.
    #[must_use]
    pub const fn requires_signature(&self) -> bool {
        self.config.webhook_secret.is_some()
    }

    /// Checks a delivery's signature header against the configured secret.
    ///
    /// Always passes when no secret is configured.
    #[must_use]
    pub fn verify_delivery(&self, body: &[u8], signature: Option<&str>) -> bool {
        match (&self.config.webhook_secret, signature) {
            (None, _) => true,
            (Some(secret), Some(header)) => verify_signature(secret.expose_secret(), body, header),
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::host::LocalHost;
    use crate::models::EventContext;
    use crate::webhooks::reconciler::tests::{MockApi, subscription};
    use crate::webhooks::signature::compute_signature;
    use secrecy::SecretString;
    use serde_json::json;
    use std::sync::Mutex;

    fn config() -> ConnectorConfig {
        ConnectorConfig::new()
            .with_base_url("https://app.example.com/")
            .with_webhook_path("/hooks")
            .with_shop_name("demo")
    }

    fn topic(name: &str) -> Topic {
        Topic::new(name).expect("topic")
    }

    fn noop() -> Arc<dyn EventHandler> {
        Arc::new(|_: &EventContext| -> Result<()> { Ok(()) })
    }

    #[test]
    fn test_on_registers_with_host() {
        let host = Arc::new(LocalHost::new());
        let mut connector =
            ShopifyConnector::with_id(config(), Arc::new(MockApi::default()), host.clone(), "c1");

        let event = connector
            .on(topic("orders/create"), noop(), None)
            .expect("declare");

        assert_eq!(event.id(), "Shopify/hooks/orders/create/c1");
        assert!(host.is_bound(event.id()));
        assert_eq!(host.delegate_for("/hooks").as_deref(), Some("c1"));
    }

    #[test]
    fn test_start_without_events_is_idle() {
        let api = Arc::new(MockApi::default());
        let connector = ShopifyConnector::new(
            ConnectorConfig::new(),
            api.clone(),
            Arc::new(LocalHost::new()),
        );

        let report = connector.start().expect("idle start");
        assert!(report.is_empty());
        assert_eq!(api.list_count(), 0);
    }

    #[test]
    fn test_start_reconciles_declared_topics() {
        let api = Arc::new(MockApi::with_existing(vec![subscription(
            "https://app.example.com/hooks",
            "orders/create",
        )]));
        let mut connector =
            ShopifyConnector::with_id(config(), api.clone(), Arc::new(LocalHost::new()), "c1");
        connector.on(topic("orders/create"), noop(), None).expect("declare");
        connector.on(topic("orders/paid"), noop(), None).expect("declare");

        let report = connector.start().expect("start");

        assert_eq!(report.reused().len(), 1);
        assert_eq!(report.created().len(), 1);
        assert_eq!(api.created_topics(), vec!["orders/paid"]);
    }

    #[test]
    fn test_strict_start_escalates_create_failure() {
        let api = Arc::new(MockApi {
            fail_topics: vec!["orders/paid".to_string()],
            ..MockApi::default()
        });
        let mut strict = config();
        strict.fail_on_create_error = true;
        let mut connector = ShopifyConnector::new(strict, api, Arc::new(LocalHost::new()));
        connector.on(topic("orders/paid"), noop(), None).expect("declare");

        let err = connector.start().expect_err("strict");
        assert!(matches!(err, Error::RemoteCreateFailure { .. }));
    }

    #[test]
    fn test_handle_passes_context_to_handler() {
        let seen: Arc<Mutex<Option<EventContext>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let mut connector = ShopifyConnector::with_id(
            config(),
            Arc::new(MockApi::default()),
            Arc::new(LocalHost::new()),
            "c1",
        );
        connector
            .on(
                topic("orders/create"),
                Arc::new(move |ctx: &EventContext| -> Result<()> {
                    *sink.lock().expect("lock") = Some(ctx.clone());
                    Ok(())
                }),
                Some("order-sync".to_string()),
            )
            .expect("declare");

        let handled = connector
            .handle(&Notification::new("orders/create", json!({"order_number": 1001})))
            .expect("handle");

        assert!(handled);
        let context = seen.lock().expect("lock").clone().expect("handler ran");
        assert_eq!(context["id"], "order-sync");
        assert_eq!(context["order_number"], 1001);
        assert_eq!(context["topic"], "orders/create");
    }

    #[test]
    fn test_verify_delivery() {
        let mut secured = config();
        secured.webhook_secret = Some(SecretString::from("hush".to_string()));
        let connector =
            ShopifyConnector::new(secured, Arc::new(MockApi::default()), Arc::new(LocalHost::new()));
        let body = br#"{"id":1}"#;
        let signature = compute_signature("hush", body).expect("signature");

        assert!(connector.requires_signature());
        assert!(connector.verify_delivery(body, Some(&signature)));
        assert!(!connector.verify_delivery(body, None));
        assert!(!connector.verify_delivery(b"{}", Some(&signature)));

        let open =
            ShopifyConnector::new(config(), Arc::new(MockApi::default()), Arc::new(LocalHost::new()));
        assert!(open.verify_delivery(body, None));
    }

    #[test]
    fn test_declare_configured_events() {
        let mut cfg = config();
        cfg.events = vec![
            crate::config::EventDeclaration {
                topic: topic("orders/create"),
                id: None,
            },
            crate::config::EventDeclaration {
                topic: topic("products/update"),
                id: Some("catalog-sync".to_string()),
            },
        ];
        let mut connector =
            ShopifyConnector::with_id(cfg, Arc::new(MockApi::default()), Arc::new(LocalHost::new()), "c1");

        let declared = connector.declare_configured(&noop()).expect("declare");

        assert_eq!(declared, 2);
        assert!(connector.registry().get("catalog-sync").is_some());
        assert_eq!(connector.registry().all_topics().len(), 2);
    }

    struct RejectingHost;

    impl Host for RejectingHost {
        fn register_event(&self, event_id: &str, _topic: &Topic) -> Result<crate::host::EventHandle> {
            Ok(crate::host::EventHandle::new(event_id))
        }

        fn bind_handler(
            &self,
            _handle: &crate::host::EventHandle,
            _handler: Arc<dyn EventHandler>,
        ) -> Result<()> {
            Err(Error::InvalidInput("handler slots exhausted".to_string()))
        }

        fn register_http_delegate(&self, _path: &str, _connector_id: &str) -> Result<()> {
            Ok(())
        }

        fn dispatch_event(&self, _event_id: &str, _context: &EventContext) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_rejected_declaration_is_not_reconciled() {
        let api = Arc::new(MockApi::default());
        let mut connector =
            ShopifyConnector::with_id(config(), api.clone(), Arc::new(RejectingHost), "c1");

        let result = connector.on(topic("orders/create"), noop(), None);

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(connector.registry().is_empty());
        let report = connector.start().expect("nothing to reconcile");
        assert!(report.is_empty());
        assert_eq!(api.list_count(), 0);
    }
}
