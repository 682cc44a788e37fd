//! Startup reconciliation of remote webhook subscriptions.
//!
//! Given the declared topics, the reconciler fetches the existing
//! subscriptions once and creates a subscription for every topic that has
//! no `(address, topic)` match. Nothing is ever deleted or updated.
//!
//! ```text
//! desired topics --> validate base URL --> list (once) --> per topic:
//!                                                            match  -> Reused
//!                                                            create -> Created
//!                                                                   -> CreateFailed
//! ```

use crate::client::SubscriptionApi;
use crate::config::callback_address;
use crate::models::{NewSubscription, Subscription, Topic};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// What reconciliation did for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum TopicOutcome {
    /// A matching subscription already existed.
    Reused,
    /// A new subscription was registered.
    Created,
    /// The create call failed or returned no creation timestamp.
    CreateFailed(String),
}

impl TopicOutcome {
    /// Returns a short label for display and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Reused => "reused",
            Self::Created => "created",
            Self::CreateFailed(_) => "create_failed",
        }
    }
}

/// Per-topic result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// Callback address subscriptions were matched against.
    ///
    /// `None` when there was nothing to reconcile.
    pub address: Option<String>,
    /// Outcome for each desired topic, in topic order.
    pub outcomes: Vec<(Topic, TopicOutcome)>,
    /// Subscriptions for desired topics that point at another address.
    pub stale: Vec<Subscription>,
}

impl ReconciliationReport {
    /// Returns true when no topic was reconciled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Returns the outcome recorded for `topic`.
    #[must_use]
    pub fn outcome(&self, topic: &Topic) -> Option<&TopicOutcome> {
        self.outcomes
            .iter()
            .find(|(t, _)| t == topic)
            .map(|(_, outcome)| outcome)
    }

    /// Topics a subscription was created for.
    #[must_use]
    pub fn created(&self) -> Vec<&Topic> {
        self.topics_where(|o| matches!(o, TopicOutcome::Created))
    }

    /// Topics that already had a matching subscription.
    #[must_use]
    pub fn reused(&self) -> Vec<&Topic> {
        self.topics_where(|o| matches!(o, TopicOutcome::Reused))
    }

    /// Topics whose create failed, with the reason.
    #[must_use]
    pub fn failed(&self) -> Vec<(&Topic, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(topic, outcome)| match outcome {
                TopicOutcome::CreateFailed(reason) => Some((topic, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Returns true when any create failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|(_, o)| matches!(o, TopicOutcome::CreateFailed(_)))
    }

    /// Escalates create failures when `strict` is set.
    ///
    /// # Errors
    ///
    /// In strict mode, returns [`Error::RemoteCreateFailure`] for the first
    /// failed topic.
    pub fn into_result(self, strict: bool) -> Result<Self> {
        if strict
            && let Some((topic, reason)) = self.failed().first()
        {
            return Err(Error::RemoteCreateFailure {
                topic: topic.to_string(),
                cause: (*reason).to_string(),
            });
        }
        Ok(self)
    }

    fn topics_where<P>(&self, predicate: P) -> Vec<&Topic>
    where
        P: Fn(&TopicOutcome) -> bool,
    {
        self.outcomes
            .iter()
            .filter(|(_, o)| predicate(o))
            .map(|(t, _)| t)
            .collect()
    }
}

/// Brings remote subscriptions in line with the declared topics.
pub struct WebhookReconciler {
    api: Arc<dyn SubscriptionApi>,
}

impl WebhookReconciler {
    /// Creates a reconciler over a subscription API.
    #[must_use]
    pub fn new(api: Arc<dyn SubscriptionApi>) -> Self {
        Self { api }
    }

    /// Reconciles `desired` topics against the remote subscriptions.
    ///
    /// Create failures are recorded per topic and never abort the pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for a missing or malformed base
    /// URL, or [`Error::RemoteListFailure`] if the existing subscriptions
    /// cannot be listed.
    pub fn reconcile(
        &self,
        desired: &BTreeSet<Topic>,
        base_url: Option<&str>,
        webhook_path: &str,
    ) -> Result<ReconciliationReport> {
        if desired.is_empty() {
            tracing::debug!("No webhook topics declared, skipping reconciliation");
            return Ok(ReconciliationReport::default());
        }

        let address = callback_address(base_url, webhook_path)?;
        let start = Instant::now();

        let existing = self.api.list_subscriptions().map_err(|e| {
            metrics::counter!("webhook_reconcile_list_failures_total").increment(1);
            tracing::error!(address = %address, error = %e, "Failed to list webhook subscriptions");
            match e {
                Error::RemoteListFailure { .. } => e,
                other => Error::RemoteListFailure {
                    cause: other.to_string(),
                },
            }
        })?;

        tracing::debug!(
            address = %address,
            existing = existing.len(),
            desired = desired.len(),
            "Reconciling webhook subscriptions"
        );

        let mut outcomes = Vec::with_capacity(desired.len());
        for topic in desired {
            let outcome = if existing.iter().any(|s| s.matches(&address, topic)) {
                tracing::info!(topic = %topic, address = %address, "Using existing webhook");
                TopicOutcome::Reused
            } else {
                self.create(&address, topic)
            };

            metrics::counter!(
                "webhook_reconcile_topics_total",
                "outcome" => outcome.label()
            )
            .increment(1);
            outcomes.push((topic.clone(), outcome));
        }

        let stale = stale_subscriptions(&existing, desired, &address);
        for sub in &stale {
            tracing::warn!(
                topic = %sub.topic,
                address = %sub.address,
                "Subscription for declared topic points at another address"
            );
        }

        metrics::histogram!("webhook_reconcile_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        Ok(ReconciliationReport {
            address: Some(address),
            outcomes,
            stale,
        })
    }

    fn create(&self, address: &str, topic: &Topic) -> TopicOutcome {
        let request = NewSubscription::new(address, topic.clone());
        match self.api.create_subscription(&request) {
            Ok(created) if created.created_at.is_some() => {
                tracing::info!(
                    topic = %topic,
                    address = %address,
                    subscription_id = ?created.id,
                    "Registered webhook"
                );
                TopicOutcome::Created
            },
            Ok(_) => {
                tracing::error!(
                    topic = %topic,
                    address = %address,
                    "Webhook registration returned no creation timestamp"
                );
                TopicOutcome::CreateFailed("response carried no creation timestamp".to_string())
            },
            Err(e) => {
                tracing::error!(
                    topic = %topic,
                    address = %address,
                    error = %e,
                    "Failed to register webhook"
                );
                TopicOutcome::CreateFailed(e.to_string())
            },
        }
    }
}

/// Subscriptions for desired topics registered against a different address.
fn stale_subscriptions(
    existing: &[Subscription],
    desired: &BTreeSet<Topic>,
    address: &str,
) -> Vec<Subscription> {
    existing
        .iter()
        .filter(|s| desired.contains(&s.topic) && s.address != address)
        .cloned()
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::DateTime;
    use std::sync::Mutex;

    /// In-memory subscription API that records every call.
    #[derive(Default)]
    pub(crate) struct MockApi {
        pub(crate) subscriptions: Mutex<Vec<Subscription>>,
        pub(crate) list_calls: Mutex<usize>,
        pub(crate) create_calls: Mutex<Vec<NewSubscription>>,
        pub(crate) fail_list: bool,
        pub(crate) fail_topics: Vec<String>,
        pub(crate) omit_created_at: Vec<String>,
    }

    impl MockApi {
        pub(crate) fn with_existing(subscriptions: Vec<Subscription>) -> Self {
            Self {
                subscriptions: Mutex::new(subscriptions),
                ..Self::default()
            }
        }

        pub(crate) fn list_count(&self) -> usize {
            *self.list_calls.lock().expect("lock")
        }

        pub(crate) fn created_topics(&self) -> Vec<String> {
            self.create_calls
                .lock()
                .expect("lock")
                .iter()
                .map(|r| r.topic.to_string())
                .collect()
        }
    }

    impl SubscriptionApi for MockApi {
        fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
            *self.list_calls.lock().expect("lock") += 1;
            if self.fail_list {
                return Err(Error::OperationFailed {
                    operation: "list_webhooks".to_string(),
                    cause: "HTTP 401: unauthorized".to_string(),
                });
            }
            Ok(self.subscriptions.lock().expect("lock").clone())
        }

        fn create_subscription(&self, request: &NewSubscription) -> Result<Subscription> {
            self.create_calls.lock().expect("lock").push(request.clone());
            let topic = request.topic.as_str();
            if self.fail_topics.iter().any(|t| t == topic) {
                return Err(Error::OperationFailed {
                    operation: "create_webhook".to_string(),
                    cause: "HTTP 422: address is invalid".to_string(),
                });
            }
            let created_at = if self.omit_created_at.iter().any(|t| t == topic) {
                None
            } else {
                DateTime::parse_from_rfc3339("2024-01-01T00:00:00-05:00").ok()
            };
            let subscription = Subscription {
                id: Some(1),
                address: request.address.clone(),
                topic: request.topic.clone(),
                created_at,
                format: Some(request.format.clone()),
            };
            self.subscriptions
                .lock()
                .expect("lock")
                .push(subscription.clone());
            Ok(subscription)
        }
    }

    pub(crate) fn subscription(address: &str, topic: &str) -> Subscription {
        Subscription {
            id: Some(7),
            address: address.to_string(),
            topic: Topic::new(topic).expect("topic"),
            created_at: None,
            format: Some("json".to_string()),
        }
    }

    fn topics(names: &[&str]) -> BTreeSet<Topic> {
        names.iter().map(|n| Topic::new(*n).expect("topic")).collect()
    }

    const BASE: &str = "https://app.example.com";
    const PATH: &str = "/hooks";
    const ADDRESS: &str = "https://app.example.com/hooks";

    #[test]
    fn test_idle_makes_no_calls() {
        let api = Arc::new(MockApi::default());
        let reconciler = WebhookReconciler::new(api.clone());

        let report = reconciler
            .reconcile(&BTreeSet::new(), None, PATH)
            .expect("idle");

        assert!(report.is_empty());
        assert_eq!(report.address, None);
        assert_eq!(api.list_count(), 0);
        assert!(api.created_topics().is_empty());
    }

    #[test]
    fn test_invalid_base_url_fails_before_remote_calls() {
        let api = Arc::new(MockApi::default());
        let reconciler = WebhookReconciler::new(api.clone());

        let err = reconciler
            .reconcile(&topics(&["orders/create"]), Some("http://app.example.com"), PATH)
            .expect_err("invalid url");

        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert_eq!(api.list_count(), 0);
    }

    #[test]
    fn test_missing_base_url_is_invalid() {
        let api = Arc::new(MockApi::default());
        let reconciler = WebhookReconciler::new(api.clone());

        let err = reconciler
            .reconcile(&topics(&["orders/create"]), None, PATH)
            .expect_err("missing url");
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_creates_missing_and_reuses_existing() {
        let api = Arc::new(MockApi::with_existing(vec![subscription(
            ADDRESS,
            "orders/create",
        )]));
        let reconciler = WebhookReconciler::new(api.clone());

        let report = reconciler
            .reconcile(&topics(&["orders/create", "products/update"]), Some(BASE), PATH)
            .expect("reconcile");

        assert_eq!(report.address.as_deref(), Some(ADDRESS));
        assert_eq!(report.reused().len(), 1);
        assert_eq!(report.created().len(), 1);
        assert_eq!(api.created_topics(), vec!["products/update"]);
        assert_eq!(api.list_count(), 1);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let api = Arc::new(MockApi::default());
        let reconciler = WebhookReconciler::new(api.clone());
        let desired = topics(&["orders/create", "orders/paid"]);

        let first = reconciler.reconcile(&desired, Some(BASE), PATH).expect("first");
        let second = reconciler.reconcile(&desired, Some(BASE), PATH).expect("second");

        assert_eq!(first.created().len(), 2);
        assert!(second.created().is_empty());
        assert_eq!(second.reused().len(), 2);
        assert_eq!(api.created_topics().len(), 2);
    }

    #[test]
    fn test_address_and_topic_must_both_match() {
        let api = Arc::new(MockApi::with_existing(vec![subscription(
            "https://other.example.com/hooks",
            "orders/create",
        )]));
        let reconciler = WebhookReconciler::new(api.clone());

        let report = reconciler
            .reconcile(&topics(&["orders/create"]), Some(BASE), PATH)
            .expect("reconcile");

        assert_eq!(api.created_topics(), vec!["orders/create"]);
        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.stale[0].address, "https://other.example.com/hooks");
    }

    #[test]
    fn test_create_failure_is_isolated_per_topic() {
        let api = Arc::new(MockApi {
            fail_topics: vec!["orders/create".to_string()],
            ..MockApi::default()
        });
        let reconciler = WebhookReconciler::new(api.clone());

        let report = reconciler
            .reconcile(&topics(&["orders/create", "orders/paid"]), Some(BASE), PATH)
            .expect("reconcile");

        assert!(report.has_failures());
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].0.as_str(), "orders/create");
        assert_eq!(report.created().len(), 1);
        assert_eq!(api.created_topics().len(), 2);
    }

    #[test]
    fn test_missing_created_at_is_a_failure() {
        let api = Arc::new(MockApi {
            omit_created_at: vec!["orders/paid".to_string()],
            ..MockApi::default()
        });
        let reconciler = WebhookReconciler::new(api);
        let paid = Topic::new("orders/paid").expect("topic");

        let report = reconciler
            .reconcile(&topics(&["orders/paid"]), Some(BASE), PATH)
            .expect("reconcile");

        assert!(matches!(
            report.outcome(&paid),
            Some(TopicOutcome::CreateFailed(_))
        ));
    }

    #[test]
    fn test_list_failure_is_fatal() {
        let api = Arc::new(MockApi {
            fail_list: true,
            ..MockApi::default()
        });
        let reconciler = WebhookReconciler::new(api.clone());

        let err = reconciler
            .reconcile(&topics(&["orders/create"]), Some(BASE), PATH)
            .expect_err("list fails");

        assert!(matches!(err, Error::RemoteListFailure { .. }));
        assert!(api.created_topics().is_empty());
    }

    #[test]
    fn test_into_result_strict_escalates() {
        let report = ReconciliationReport {
            address: Some(ADDRESS.to_string()),
            outcomes: vec![(
                Topic::new("orders/create").expect("topic"),
                TopicOutcome::CreateFailed("HTTP 422".to_string()),
            )],
            stale: Vec::new(),
        };

        assert!(report.clone().into_result(false).is_ok());
        let err = report.into_result(true).expect_err("strict");
        assert!(matches!(err, Error::RemoteCreateFailure { ref topic, .. } if topic == "orders/create"));
    }
}
