//! Callback address validation.

use crate::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// An HTTPS origin: scheme, dot-separated host labels, optional port, and
/// at most a single trailing slash.
static BASE_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https://[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)*(:\d{1,5})?)/?$")
        .unwrap_or_else(|_| unreachable!("base URL pattern is a valid regex"))
});

/// Validates a base URL and returns it without a trailing slash.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] unless `url` is a well-formed
/// HTTPS origin with no path or query.
pub fn validate_base_url(url: Option<&str>) -> Result<String> {
    let Some(url) = url else {
        return Err(Error::InvalidConfiguration(
            "Invalid url: base_url is not set".to_string(),
        ));
    };

    BASE_URL_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|origin| origin.as_str().to_string())
        .ok_or_else(|| Error::InvalidConfiguration(format!("Invalid url: {url}")))
}

/// Validates a webhook path.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] if the path does not start with `/`,
/// carries a query string or fragment, or has a segment the router would
/// read as a capture (`{id}`, `:id`, `*rest`).
pub fn validate_webhook_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(Error::InvalidConfiguration(format!(
            "webhook path must start with '/': {path}"
        )));
    }
    if path.contains(['?', '#']) {
        return Err(Error::InvalidConfiguration(format!(
            "webhook path must not contain a query or fragment: {path}"
        )));
    }
    if path.contains(['{', '}'])
        || path
            .split('/')
            .any(|segment| segment.starts_with([':', '*']))
    {
        return Err(Error::InvalidConfiguration(format!(
            "webhook path must be a literal path: {path}"
        )));
    }
    Ok(())
}

/// Builds the callback address deliveries are registered against.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] if either part is invalid.
pub fn callback_address(base_url: Option<&str>, webhook_path: &str) -> Result<String> {
    let origin = validate_base_url(base_url)?;
    validate_webhook_path(webhook_path)?;
    Ok(format!("{origin}{webhook_path}"))
}
