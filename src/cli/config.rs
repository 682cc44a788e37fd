//! Config CLI command.

// CLI commands are allowed to use println! for output
#![allow(clippy::print_stdout)]

use crate::config::ConnectorConfig;
use crate::{Error, Result};
use secrecy::SecretString;
use serde::Serialize;

const REDACTED: &str = "<redacted>";

/// Effective configuration with secrets masked.
#[derive(Debug, Serialize)]
struct ConfigView<'a> {
    base_url: Option<&'a str>,
    webhook_path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook_secret: Option<&'static str>,
    fail_on_create_error: bool,
    shop: ShopView<'a>,
    events: Vec<EventView<'a>>,
}

#[derive(Debug, Serialize)]
struct ShopView<'a> {
    shop_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<&'static str>,
    api_version: &'a str,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct EventView<'a> {
    topic: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
}

fn redact(secret: Option<&SecretString>) -> Option<&'static str> {
    secret.map(|_| REDACTED)
}

/// Renders the effective configuration as TOML, secrets redacted.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized.
pub fn render_config(config: &ConnectorConfig) -> Result<String> {
    let view = ConfigView {
        base_url: config.base_url.as_deref(),
        webhook_path: config.webhook_path(),
        webhook_name: config.webhook_name.as_deref(),
        webhook_secret: redact(config.webhook_secret.as_ref()),
        fail_on_create_error: config.fail_on_create_error,
        shop: ShopView {
            shop_name: &config.shop.shop_name,
            api_key: config.shop.api_key.as_deref(),
            password: redact(config.shop.password.as_ref()),
            access_token: redact(config.shop.access_token.as_ref()),
            api_version: &config.shop.api_version,
            timeout_secs: config.shop.timeout_secs,
        },
        events: config
            .events
            .iter()
            .map(|e| EventView {
                topic: e.topic.as_str(),
                id: e.id.as_deref(),
            })
            .collect(),
    };

    toml::to_string_pretty(&view).map_err(|e| Error::OperationFailed {
        operation: "serialize_config".to_string(),
        cause: e.to_string(),
    })
}

/// Prints the effective configuration.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized.
pub fn cmd_config_show(config: &ConnectorConfig) -> Result<()> {
    println!("{}", render_config(config)?);
    Ok(())
}
