//! HTTP delegate for inbound deliveries.
//!
//! Shopify POSTs each delivery to the connector's webhook path:
//!
//! | Condition | Status |
//! |-----------|--------|
//! | All matching handlers ran | 200 |
//! | Missing `X-Shopify-Topic`, body is not JSON | 400 |
//! | Signature missing or wrong (secret configured) | 401 |
//! | A handler failed | 500 |
//!
//! Handlers are synchronous, so each dispatch runs on the blocking pool.
//! With a Prometheus handle, `/metrics` is served from the same listener.

use super::ShopifyConnector;
use crate::Result;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

#[cfg(feature = "http")]
use {
    crate::Error,
    crate::config::validate_webhook_path,
    crate::models::{HMAC_HEADER, Notification, SHOP_DOMAIN_HEADER, TOPIC_HEADER},
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    },
    serde_json::{Value, json},
};

/// Builds the router serving the connector's webhook path and `/health`.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] if the webhook path is not a
/// literal absolute path.
#[cfg(feature = "http")]
pub fn router(connector: Arc<ShopifyConnector>) -> Result<Router> {
    use tower_http::trace::TraceLayer;

    let path = connector.webhook_path().to_string();
    validate_webhook_path(&path)?;
    if path == "/health" || path == "/metrics" {
        return Err(Error::InvalidConfiguration(format!(
            "webhook path {path} is reserved"
        )));
    }

    Ok(Router::new()
        .route(&path, post(handle_delivery))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(connector))
}

/// Adds a `GET /metrics` route rendering the Prometheus text format.
#[cfg(feature = "http")]
pub fn with_metrics(app: Router, prometheus: PrometheusHandle) -> Router {
    app.route(
        "/metrics",
        get(move || {
            let prometheus = prometheus.clone();
            async move { prometheus.render() }
        }),
    )
}

/// Serves deliveries on `0.0.0.0:port` until the process exits.
///
/// Blocks the calling thread on a dedicated runtime.
///
/// # Errors
///
/// Returns an error if the webhook path is invalid, the runtime cannot
/// start, or the port cannot be bound.
#[cfg(feature = "http")]
pub fn run(
    connector: Arc<ShopifyConnector>,
    port: u16,
    prometheus: Option<PrometheusHandle>,
) -> Result<()> {
    let path = connector.webhook_path().to_string();
    let mut app = router(connector)?;
    if let Some(prometheus) = prometheus {
        app = with_metrics(app, prometheus);
    }

    let rt = tokio::runtime::Runtime::new().map_err(|e| Error::OperationFailed {
        operation: "create_runtime".to_string(),
        cause: e.to_string(),
    })?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(port, path = %path, "Starting webhook HTTP server");

    rt.block_on(async {
        let listener =
            tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| Error::OperationFailed {
                    operation: "bind".to_string(),
                    cause: e.to_string(),
                })?;

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::OperationFailed {
                operation: "serve".to_string(),
                cause: e.to_string(),
            })
    })
}

/// Serves deliveries (feature not enabled).
///
/// # Errors
///
/// Always returns [`crate::Error::FeatureNotEnabled`].
#[cfg(not(feature = "http"))]
pub fn run(
    _connector: Arc<ShopifyConnector>,
    _port: u16,
    _prometheus: Option<PrometheusHandle>,
) -> Result<()> {
    Err(crate::Error::FeatureNotEnabled("http".to_string()))
}

#[cfg(feature = "http")]
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(feature = "http")]
async fn handle_delivery(
    State(connector): State<Arc<ShopifyConnector>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    if !connector.verify_delivery(&body, header_value(&headers, HMAC_HEADER)) {
        metrics::counter!("webhook_deliveries_rejected_total", "reason" => "signature").increment(1);
        tracing::warn!("Rejected delivery with invalid signature");
        return reject(StatusCode::UNAUTHORIZED, "invalid signature");
    }

    let Some(topic) = header_value(&headers, TOPIC_HEADER).filter(|t| !t.is_empty()) else {
        metrics::counter!("webhook_deliveries_rejected_total", "reason" => "topic").increment(1);
        return reject(StatusCode::BAD_REQUEST, "missing X-Shopify-Topic header");
    };

    let payload = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                metrics::counter!("webhook_deliveries_rejected_total", "reason" => "body")
                    .increment(1);
                tracing::warn!(topic, error = %e, "Rejected delivery with invalid JSON body");
                return reject(StatusCode::BAD_REQUEST, "body is not valid JSON");
            },
        }
    };

    let mut notification = Notification::new(topic, payload);
    if let Some(shop) = header_value(&headers, SHOP_DOMAIN_HEADER) {
        notification = notification.with_shop_domain(shop);
    }

    let dispatched =
        tokio::task::spawn_blocking(move || connector.handle(&notification)).await;

    match dispatched {
        Ok(Ok(handled)) => (StatusCode::OK, Json(json!({ "handled": handled }))),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Delivery handling failed");
            reject(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        },
        Err(e) => {
            tracing::error!(error = %e, "Delivery task panicked or was cancelled");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "delivery task failed")
        },
    }
}

#[cfg(feature = "http")]
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(feature = "http")]
fn reject(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "handled": false, "error": message })))
}
