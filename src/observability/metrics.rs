//! Prometheus metrics.
//!
//! Counters and histograms are recorded through the `metrics` macros. With
//! a dedicated port configured, the exporter runs its own scrape listener;
//! otherwise the webhook server renders `/metrics` from the returned handle.

use crate::config::MetricsSettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::{Ipv4Addr, SocketAddr};

/// Metrics configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether a recorder is installed at all.
    pub enabled: bool,
    /// Dedicated scrape port; `None` serves metrics from the webhook server.
    pub port: Option<u16>,
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings with env overrides.
    #[must_use]
    pub fn from_settings(settings: Option<&MetricsSettings>) -> Self {
        Self::from_settings_with(settings, |key| std::env::var(key).ok())
    }

    /// Builds metrics configuration using an arbitrary variable lookup.
    ///
    /// `SHOPIFY_CONNECTOR_METRICS_ENABLED` accepts `true`/`1`/`yes`;
    /// an unparsable `SHOPIFY_CONNECTOR_METRICS_PORT` is ignored.
    #[must_use]
    pub fn from_settings_with<F>(settings: Option<&MetricsSettings>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("SHOPIFY_CONNECTOR_METRICS_ENABLED")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .or_else(|| settings.and_then(|s| s.enabled))
            .unwrap_or(false);

        let port = lookup("SHOPIFY_CONNECTOR_METRICS_PORT")
            .and_then(|v| v.trim().parse::<u16>().ok())
            .or_else(|| settings.and_then(|s| s.port));

        Self { enabled, port }
    }

    /// Returns the scrape listener address, if a dedicated port is set.
    #[must_use]
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.port
            .map(|port| SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
    }
}

/// Installs the global Prometheus recorder.
///
/// When `expose` is set and a dedicated port is configured, the exporter's
/// own listener serves scrapes and `Ok(None)` is returned. Otherwise the
/// returned handle renders the current metrics on demand. Disabled metrics
/// install nothing, leaving the `metrics` macros as no-ops.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or the listener
/// cannot be started.
pub fn install_prometheus(config: &MetricsConfig, expose: bool) -> Result<Option<PrometheusHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    if expose && let Some(addr) = config.listen_addr() {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| Error::OperationFailed {
                operation: "metrics_listener_install".to_string(),
                cause: e.to_string(),
            })?;
        tracing::info!(listen_addr = %addr, "Prometheus scrape listener started");
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::OperationFailed {
            operation: "metrics_recorder_install".to_string(),
            cause: e.to_string(),
        })?;
    tracing::debug!("Prometheus recorder installed");
    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_disabled_metrics_install_nothing() {
        let handle = install_prometheus(&MetricsConfig::default(), true).expect("install");
        assert!(handle.is_none());
    }

    #[test]
    fn test_settings_without_env() {
        let settings = MetricsSettings {
            enabled: Some(true),
            port: Some(9464),
        };
        let config = MetricsConfig::from_settings_with(Some(&settings), no_env);

        assert!(config.enabled);
        assert_eq!(config.listen_addr().map(|a| a.port()), Some(9464));
    }

    #[test]
    fn test_env_overrides_settings() {
        let settings = MetricsSettings {
            enabled: Some(false),
            port: Some(9464),
        };
        let config = MetricsConfig::from_settings_with(Some(&settings), |key| match key {
            "SHOPIFY_CONNECTOR_METRICS_ENABLED" => Some("yes".to_string()),
            "SHOPIFY_CONNECTOR_METRICS_PORT" => Some("not-a-port".to_string()),
            _ => None,
        });

        assert!(config.enabled);
        assert_eq!(config.port, Some(9464));
    }

    #[test]
    fn test_no_port_means_no_listener() {
        let config = MetricsConfig::from_settings_with(None, no_env);
        assert_eq!(config, MetricsConfig::default());
        assert!(config.listen_addr().is_none());
    }
}
