//! Serve CLI command.

use crate::Result;
use crate::config::ConnectorConfig;
use crate::host::{EventHandler, LocalHost, LoggingHandler};
use crate::webhooks::{ShopifyConnector, server};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Default port for the webhook HTTP server.
pub const DEFAULT_PORT: u16 = 8000;

/// Declares the configured events, reconciles subscriptions and serves
/// deliveries until the process exits.
///
/// Every configured topic is routed to a [`LoggingHandler`]. A Prometheus
/// handle, when given, is served at `/metrics`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, listing subscriptions
/// fails, or the server cannot start.
pub fn cmd_serve(
    config: ConnectorConfig,
    port: u16,
    prometheus: Option<PrometheusHandle>,
) -> Result<()> {
    let host = Arc::new(LocalHost::new());
    let mut connector = ShopifyConnector::from_config(config, host)?;

    let handler: Arc<dyn EventHandler> = Arc::new(LoggingHandler);
    let declared = connector.declare_configured(&handler)?;
    if declared == 0 {
        tracing::warn!("No [[events]] configured, deliveries will not reach any handler");
    }

    let report = connector.start()?;
    for (topic, reason) in report.failed() {
        tracing::warn!(topic = %topic, reason, "Topic has no subscription, deliveries will be missing");
    }

    // Keep a handle outside the server runtime so the blocking API client is
    // never dropped from async context.
    let connector = Arc::new(connector);
    server::run(Arc::clone(&connector), port, prometheus)
}
