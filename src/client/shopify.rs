//! Shopify Admin REST client for webhook subscriptions.

use super::SubscriptionApi;
use crate::config::ShopConfig;
use crate::models::{NewSubscription, Subscription};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest page size the webhooks endpoint accepts.
const MAX_PAGE_SIZE: u32 = 250;

/// How the client authenticates.
#[derive(Debug, Clone)]
enum Credentials {
    /// `X-Shopify-Access-Token` header.
    AccessToken(SecretString),
    /// Private app basic auth.
    Basic {
        api_key: String,
        password: SecretString,
    },
}

/// Shopify Admin API client.
pub struct ShopifyClient {
    /// Admin API base, e.g. `https://my-store.myshopify.com/admin/api/2024-01`.
    endpoint: String,
    /// Credentials.
    credentials: Credentials,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct WebhookList {
    #[serde(default)]
    webhooks: Vec<Subscription>,
}

#[derive(Debug, Serialize)]
struct CreateWebhookRequest<'a> {
    webhook: &'a NewSubscription,
}

#[derive(Debug, Deserialize)]
struct CreateWebhookResponse {
    webhook: Subscription,
}

impl ShopifyClient {
    /// Creates a client from shop configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the shop name is empty or no
    /// credentials are configured.
    pub fn from_config(config: &ShopConfig) -> Result<Self> {
        let shop_name = config.shop_name.trim();
        if shop_name.is_empty() {
            return Err(Error::InvalidConfiguration(
                "shop name is not set".to_string(),
            ));
        }

        let credentials = match (&config.access_token, &config.api_key, &config.password) {
            (Some(token), _, _) => Credentials::AccessToken(token.clone()),
            (None, Some(api_key), Some(password)) => Credentials::Basic {
                api_key: api_key.clone(),
                password: password.clone(),
            },
            _ => {
                return Err(Error::InvalidConfiguration(
                    "either an access token or an API key and password is required".to_string(),
                ));
            },
        };

        Ok(Self {
            endpoint: format!(
                "https://{}/admin/api/{}",
                shop_host(shop_name),
                config.api_version
            ),
            credentials,
            client: build_http_client(Duration::from_secs(config.timeout_secs)),
        })
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Returns the API endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn webhooks_url(&self) -> String {
        format!("{}/webhooks.json", self.endpoint.trim_end_matches('/'))
    }

    fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.credentials {
            Credentials::AccessToken(token) => {
                request.header("X-Shopify-Access-Token", token.expose_secret())
            },
            Credentials::Basic { api_key, password } => {
                request.basic_auth(api_key, Some(password.expose_secret()))
            },
        }
    }

    /// Sends a request and parses a successful JSON response.
    fn send<T>(&self, operation: &str, request: reqwest::blocking::RequestBuilder) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .authorize(request)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connect"
                } else {
                    "request"
                };
                tracing::error!(
                    operation,
                    error = %e,
                    error_kind,
                    "Shopify request failed"
                );
                Error::OperationFailed {
                    operation: operation.to_string(),
                    cause: format!("{error_kind} error: {e}"),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(
                operation,
                status = %status,
                body = %body,
                "Shopify API returned error status"
            );
            return Err(Error::OperationFailed {
                operation: operation.to_string(),
                cause: format!("HTTP {}: {body}", status.as_u16()),
            });
        }

        response.json::<T>().map_err(|e| Error::OperationFailed {
            operation: operation.to_string(),
            cause: format!("invalid response body: {e}"),
        })
    }
}

impl SubscriptionApi for ShopifyClient {
    fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let request = self
            .client
            .get(self.webhooks_url())
            .query(&[("limit", MAX_PAGE_SIZE)]);

        let list: WebhookList = self.send("list_webhooks", request)?;
        tracing::debug!(count = list.webhooks.len(), "Listed webhook subscriptions");
        Ok(list.webhooks)
    }

    fn create_subscription(&self, subscription: &NewSubscription) -> Result<Subscription> {
        let request = self
            .client
            .post(self.webhooks_url())
            .json(&CreateWebhookRequest {
                webhook: subscription,
            });

        let created: CreateWebhookResponse = self.send("create_webhook", request)?;
        Ok(created.webhook)
    }
}

/// Expands a bare shop name to its `myshopify.com` host.
fn shop_host(shop_name: &str) -> String {
    if shop_name.contains('.') {
        shop_name.to_string()
    } else {
        format!("{shop_name}.myshopify.com")
    }
}

fn build_http_client(timeout: Duration) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder()
        .user_agent(format!("shopify-connector/{}", env!("CARGO_PKG_VERSION")));
    if !timeout.is_zero() {
        builder = builder.timeout(timeout);
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build Shopify HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}
