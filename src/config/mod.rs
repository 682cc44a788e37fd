//! Configuration management.
//!
//! Configuration is read from `~/.config/shopify-connector/config.toml`
//! (or an explicit path) and then overridden from `SHOPIFY_*` environment
//! variables:
//!
//! ```toml
//! base_url = "https://app.example.com"
//! webhook_path = "/reshuffle-shopify-connector/webhook"
//! webhook_secret = "${SHOPIFY_WEBHOOK_SECRET}"
//!
//! [shop]
//! shop_name = "my-store"
//! access_token = "${SHOPIFY_ACCESS_TOKEN}"
//! api_version = "2024-01"
//!
//! [[events]]
//! topic = "orders/create"
//!
//! [[events]]
//! topic = "products/update"
//! id = "catalog-sync"
//! ```

mod validation;

pub use validation::{callback_address, validate_base_url, validate_webhook_path};

use crate::models::Topic;
use crate::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Path inbound deliveries are received on when none is configured.
pub const DEFAULT_WEBHOOK_PATH: &str = "/reshuffle-shopify-connector/webhook";

/// Admin API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "2024-01";

/// Admin API request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "SHOPIFY_CONNECTOR_CONFIG";

/// Main configuration for the connector.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Shop credentials for the Admin API.
    pub shop: ShopConfig,
    /// HTTPS origin this application is reachable at.
    pub base_url: Option<String>,
    /// Path inbound deliveries are received on.
    pub webhook_path: Option<String>,
    /// Display name for the webhook endpoint; not used by reconciliation.
    pub webhook_name: Option<String>,
    /// Shared secret used to verify inbound delivery signatures.
    pub webhook_secret: Option<SecretString>,
    /// Whether any failed subscription create fails startup.
    pub fail_on_create_error: bool,
    /// Topics declared in the config file.
    pub events: Vec<EventDeclaration>,
    /// Logging and metrics settings.
    pub observability: ObservabilitySettings,
}

/// Shop credentials.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// Shop name (`my-store` for `my-store.myshopify.com`).
    pub shop_name: String,
    /// Private app API key, used with `password` for basic auth.
    pub api_key: Option<String>,
    /// Private app password.
    pub password: Option<SecretString>,
    /// Admin API access token (preferred over basic auth).
    pub access_token: Option<SecretString>,
    /// Admin API version.
    pub api_version: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            shop_name: String::new(),
            api_key: None,
            password: None,
            access_token: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// A topic declared in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventDeclaration {
    /// Topic to subscribe to.
    pub topic: Topic,
    /// Explicit event id; synthesised when absent.
    #[serde(default)]
    pub id: Option<String>,
}

/// Observability settings from the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservabilitySettings {
    /// Logging settings.
    pub logging: Option<LoggingSettings>,
    /// Metrics settings.
    pub metrics: Option<MetricsSettings>,
}

/// Logging settings from the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Output format: `pretty` or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directive, such as `shopify_connector=debug`.
    pub filter: Option<String>,
    /// Log file path; logs go to stderr when unset.
    pub file: Option<String>,
}

/// Metrics settings from the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics are recorded.
    pub enabled: Option<bool>,
    /// Port for the Prometheus scrape listener.
    pub port: Option<u16>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Base URL.
    pub base_url: Option<String>,
    /// Webhook path.
    pub webhook_path: Option<String>,
    /// Webhook name.
    pub webhook_name: Option<String>,
    /// Webhook signing secret.
    pub webhook_secret: Option<String>,
    /// Fail startup on any create failure.
    pub fail_on_create_error: Option<bool>,
    /// Shop section.
    pub shop: Option<ConfigFileShop>,
    /// Declared events.
    #[serde(default)]
    pub events: Vec<EventDeclaration>,
    /// Observability section.
    pub observability: Option<ObservabilitySettings>,
}

/// Shop section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileShop {
    /// Shop name.
    pub shop_name: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Access token.
    pub access_token: Option<String>,
    /// API version.
    pub api_version: Option<String>,
    /// Timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            shop: ShopConfig::default(),
            base_url: None,
            webhook_path: None,
            webhook_name: None,
            webhook_secret: None,
            fail_on_create_error: false,
            events: Vec::new(),
            observability: ObservabilitySettings::default(),
        }
    }
}

impl ConnectorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parses configuration from TOML text without environment overrides.
    ///
    /// `${VAR}` references in secret fields are expanded from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Self::from_toml_with(contents, |key| std::env::var(key).ok())
    }

    /// Parses configuration from TOML text, expanding `${VAR}` references
    /// through `lookup`.
    ///
    /// A secret whose reference is unset, or whose value is empty, is
    /// treated as not configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml_with<F>(contents: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self::from_config_file(file, &lookup))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `$SHOPIFY_CONNECTOR_CONFIG`, then the platform config dir, then
    /// `~/.config/shopify-connector/config.toml`. Falls back to defaults
    /// (plus environment overrides) when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load_default() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.trim().is_empty()
        {
            return Self::load_from_file(Path::new(&path));
        }

        if let Some(path) = Self::default_paths().into_iter().find(|p| p.exists()) {
            return Self::load_from_file(&path);
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Candidate config file locations, most specific first.
    fn default_paths() -> Vec<PathBuf> {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Vec::new();
        };

        vec![
            base_dirs
                .config_dir()
                .join("shopify-connector")
                .join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("shopify-connector")
                .join("config.toml"),
        ]
    }

    /// Converts a `ConfigFile` to `ConnectorConfig`.
    fn from_config_file<F>(file: ConfigFile, lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            base_url: file.base_url,
            webhook_path: file.webhook_path,
            webhook_name: file.webhook_name,
            webhook_secret: secret_field(file.webhook_secret.as_deref(), lookup),
            fail_on_create_error: file.fail_on_create_error.unwrap_or(false),
            events: file.events,
            observability: file.observability.unwrap_or_default(),
            ..Self::default()
        };

        if let Some(shop) = file.shop {
            if let Some(name) = shop.shop_name {
                config.shop.shop_name = name;
            }
            config.shop.api_key = shop.api_key;
            config.shop.password = secret_field(shop.password.as_deref(), lookup);
            config.shop.access_token = secret_field(shop.access_token.as_deref(), lookup);
            if let Some(version) = shop.api_version {
                config.shop.api_version = version;
            }
            if let Some(timeout) = shop.timeout_secs {
                config.shop.timeout_secs = timeout;
            }
        }

        config
    }

    /// Applies `SHOPIFY_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SHOPIFY_SHOP_NAME") {
            self.shop.shop_name = v;
        }
        if let Some(v) = get("SHOPIFY_API_KEY") {
            self.shop.api_key = Some(v);
        }
        if let Some(v) = get("SHOPIFY_PASSWORD") {
            self.shop.password = Some(SecretString::from(v));
        }
        if let Some(v) = get("SHOPIFY_ACCESS_TOKEN") {
            self.shop.access_token = Some(SecretString::from(v));
        }
        if let Some(v) = get("SHOPIFY_API_VERSION") {
            self.shop.api_version = v;
        }
        if let Some(v) = get("SHOPIFY_BASE_URL") {
            self.base_url = Some(v);
        }
        if let Some(v) = get("SHOPIFY_WEBHOOK_PATH") {
            self.webhook_path = Some(v);
        }
        if let Some(v) = get("SHOPIFY_WEBHOOK_SECRET") {
            self.webhook_secret = Some(SecretString::from(v));
        }
    }

    /// Returns the configured webhook path, or the default.
    #[must_use]
    pub fn webhook_path(&self) -> &str {
        self.webhook_path.as_deref().unwrap_or(DEFAULT_WEBHOOK_PATH)
    }

    /// Returns the address subscriptions are registered against.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the base URL is missing or malformed.
    pub fn callback_address(&self) -> Result<String> {
        callback_address(self.base_url.as_deref(), self.webhook_path())
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the webhook path.
    #[must_use]
    pub fn with_webhook_path(mut self, path: impl Into<String>) -> Self {
        self.webhook_path = Some(path.into());
        self
    }

    /// Sets the shop name.
    #[must_use]
    pub fn with_shop_name(mut self, name: impl Into<String>) -> Self {
        self.shop.shop_name = name.into();
        self
    }
}

/// Expands a whole-value `${VAR}` reference; other values are returned as-is.
///
/// Returns `None` when the variable is unset or the result is blank.
fn expand_env_reference<F>(value: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .map_or_else(|| Some(value.to_string()), lookup)
        .filter(|v| !v.trim().is_empty())
}

fn secret_field<F>(value: Option<&str>, lookup: &F) -> Option<SecretString>
where
    F: Fn(&str) -> Option<String>,
{
    value
        .and_then(|v| expand_env_reference(v, lookup))
        .map(SecretString::from)
}
