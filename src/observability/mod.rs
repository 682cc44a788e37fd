//! Observability: structured logging and metrics.
//!
//! Logs go to stderr, or to an append-only file when `logging.file` is set.
//! `init` may run once per process.

mod logging;
mod metrics;

pub use logging::{LogFormat, LoggingConfig};
pub use metrics::{MetricsConfig, install_prometheus};

use crate::config::ObservabilitySettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Full observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
    /// Whether a dedicated scrape listener may be started.
    pub metrics_expose: bool,
}

/// Options passed from the CLI.
#[derive(Debug, Clone, Copy)]
pub struct InitOptions {
    /// `--verbose` was given.
    pub verbose: bool,
    /// The command is long-running and should expose metrics.
    pub metrics_expose: bool,
}

/// Keeps the metrics recorder reachable after init.
#[derive(Clone, Default)]
pub struct ObservabilityHandle {
    prometheus: Option<PrometheusHandle>,
}

impl ObservabilityHandle {
    /// Renders the current metrics in Prometheus text format, if recorded
    /// without a dedicated listener.
    #[must_use]
    pub fn render_metrics(&self) -> Option<String> {
        self.prometheus.as_ref().map(PrometheusHandle::render)
    }

    /// Returns the Prometheus handle for serving `/metrics` in-process.
    #[must_use]
    pub fn prometheus(&self) -> Option<PrometheusHandle> {
        self.prometheus.clone()
    }
}

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes observability from config settings with env overrides.
///
/// # Errors
///
/// See [`init`].
pub fn init_from_config(
    settings: &ObservabilitySettings,
    options: InitOptions,
) -> Result<ObservabilityHandle> {
    init(ObservabilityConfig {
        logging: LoggingConfig::from_settings(settings.logging.as_ref(), options.verbose),
        metrics: MetricsConfig::from_settings(settings.metrics.as_ref()),
        metrics_expose: options.metrics_expose,
    })
}

/// Installs the tracing subscriber and metrics recorder.
///
/// # Errors
///
/// Returns an error on a second call, an invalid filter directive, an
/// unwritable log file, or a recorder that fails to install.
pub fn init(config: ObservabilityConfig) -> Result<ObservabilityHandle> {
    if INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(init_failed("observability already initialized"));
    }

    let filter = EnvFilter::try_new(&config.logging.filter)
        .map_err(|e| init_failed(format!("invalid log filter '{}': {e}", config.logging.filter)))?;

    let (writer, ansi) = match &config.logging.file {
        Some(path) => (BoxMakeWriter::new(Mutex::new(open_log_file(path)?)), false),
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let subscriber = tracing_subscriber::registry().with(filter);
    let installed = match config.logging.format {
        LogFormat::Json => subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init(),
    };
    installed.map_err(|e| init_failed(e.to_string()))?;

    let prometheus = install_prometheus(&config.metrics, config.metrics_expose)?;
    tracing::debug!(
        format = ?config.logging.format,
        metrics = config.metrics.enabled,
        "Observability initialized"
    );

    Ok(ObservabilityHandle { prometheus })
}

/// Opens `path` for appending, creating parent directories.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_log_dir".to_string(),
            cause: e.to_string(),
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::OperationFailed {
            operation: "open_log_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })
}

fn init_failed(cause: impl Into<String>) -> Error {
    Error::OperationFailed {
        operation: "observability_init".to_string(),
        cause: cause.into(),
    }
}
