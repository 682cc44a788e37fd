//! Webhook CLI commands.
//!
//! - List the subscriptions registered with Shopify
//! - Reconcile declared topics and print the per-topic outcome

// CLI commands are allowed to use println! for output
#![allow(clippy::print_stdout)]

use crate::client::SubscriptionApi;
use crate::models::{Subscription, Topic};
use crate::webhooks::{ReconciliationReport, ShopifyConnector, TopicOutcome};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt::Write as _;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
    /// YAML.
    Yaml,
}

impl OutputFormat {
    /// Parses a format name; unknown names fall back to a table.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            _ => Self::Table,
        }
    }
}

/// Lists the webhook subscriptions registered with the shop.
///
/// # Errors
///
/// Returns an error if the subscriptions cannot be listed or serialized.
pub fn cmd_list(api: &dyn SubscriptionApi, format: OutputFormat) -> Result<()> {
    let subscriptions = api.list_subscriptions()?;

    match format {
        OutputFormat::Json => println!("{}", to_json(&subscriptions, "serialize_subscriptions")?),
        OutputFormat::Yaml => println!("{}", to_yaml(&subscriptions, "serialize_subscriptions")?),
        OutputFormat::Table if subscriptions.is_empty() => {
            println!("No webhook subscriptions registered.");
        },
        OutputFormat::Table => print!("{}", render_subscriptions(&subscriptions)),
    }

    Ok(())
}

/// Reconciles declared topics plus `extra` and prints the report.
///
/// # Errors
///
/// Returns an error if reconciliation fails, or in `strict` mode if any
/// subscription could not be created.
pub fn cmd_reconcile(
    connector: &ShopifyConnector,
    extra: &[Topic],
    strict: bool,
    format: OutputFormat,
) -> Result<()> {
    // Render before escalating so failures are still visible.
    let report = connector.reconcile_topics(extra, false)?;

    match format {
        OutputFormat::Json => println!("{}", to_json(&report, "serialize_report")?),
        OutputFormat::Yaml => println!("{}", to_yaml(&report, "serialize_report")?),
        OutputFormat::Table if report.is_empty() => {
            println!("No webhook topics declared.");
            println!();
            println!("Declare topics with [[events]] in the config file or pass --topic.");
        },
        OutputFormat::Table => print!("{}", render_report(&report)),
    }

    report.into_result(strict).map(|_| ())
}

/// Renders subscriptions as a table.
fn render_subscriptions(subscriptions: &[Subscription]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Webhook Subscriptions:");
    let _ = writeln!(out, "{}", "-".repeat(90));
    let _ = writeln!(out, "{:<15} {:<25} {:<50}", "ID", "TOPIC", "ADDRESS");
    let _ = writeln!(out, "{}", "-".repeat(90));

    for sub in subscriptions {
        let id = sub.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        let _ = writeln!(
            out,
            "{:<15} {:<25} {:<50}",
            id,
            truncate(sub.topic.as_str(), 23),
            truncate(&sub.address, 48)
        );
    }

    let _ = writeln!(out, "{}", "-".repeat(90));
    let _ = writeln!(out, "Total: {} subscription(s)", subscriptions.len());
    out
}

/// Renders a reconciliation report as a table.
fn render_report(report: &ReconciliationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Reconciled against {}",
        report.address.as_deref().unwrap_or("-")
    );
    let _ = writeln!(out, "{}", "-".repeat(80));
    let _ = writeln!(out, "{:<25} {:<15} {:<38}", "TOPIC", "OUTCOME", "DETAIL");
    let _ = writeln!(out, "{}", "-".repeat(80));

    for (topic, outcome) in &report.outcomes {
        let detail = match outcome {
            TopicOutcome::CreateFailed(reason) => truncate(reason, 36),
            TopicOutcome::Reused | TopicOutcome::Created => String::new(),
        };
        let _ = writeln!(
            out,
            "{:<25} {:<15} {:<38}",
            truncate(topic.as_str(), 23),
            outcome.label(),
            detail
        );
    }

    let _ = writeln!(out, "{}", "-".repeat(80));
    let _ = writeln!(
        out,
        "Created: {}  Reused: {}  Failed: {}",
        report.created().len(),
        report.reused().len(),
        report.failed().len()
    );

    if !report.stale.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Subscriptions for declared topics at other addresses:");
        for sub in &report.stale {
            let _ = writeln!(out, "  {} -> {}", sub.topic, sub.address);
        }
    }
    out
}

fn to_json<T: Serialize + ?Sized>(value: &T, operation: &str) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    })
}

fn to_yaml<T: Serialize + ?Sized>(value: &T, operation: &str) -> Result<String> {
    serde_yaml_ng::to_string(value).map_err(|e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    })
}

/// Truncates a string to `max` characters, marking the cut with `...`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str) -> Topic {
        Topic::new(name).expect("topic")
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("yml"), OutputFormat::Yaml);
        assert_eq!(OutputFormat::parse("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::parse("csv"), OutputFormat::Table);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("orders/create", 20), "orders/create");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }

    #[test]
    fn test_render_report() {
        let report = ReconciliationReport {
            address: Some("https://app.example.com/hooks".to_string()),
            outcomes: vec![
                (topic("orders/create"), TopicOutcome::Reused),
                (topic("orders/paid"), TopicOutcome::Created),
                (
                    topic("carts/update"),
                    TopicOutcome::CreateFailed("HTTP 422".to_string()),
                ),
            ],
            stale: vec![Subscription {
                id: Some(3),
                address: "https://old.example.com/hooks".to_string(),
                topic: topic("orders/create"),
                created_at: None,
                format: None,
            }],
        };

        let table = render_report(&report);
        assert!(table.contains("Reconciled against https://app.example.com/hooks"));
        assert!(table.contains("create_failed"));
        assert!(table.contains("HTTP 422"));
        assert!(table.contains("Created: 1  Reused: 1  Failed: 1"));
        assert!(table.contains("orders/create -> https://old.example.com/hooks"));
    }

    #[test]
    fn test_render_subscriptions() {
        let subs = vec![Subscription {
            id: Some(42),
            address: "https://app.example.com/hooks".to_string(),
            topic: topic("orders/create"),
            created_at: None,
            format: Some("json".to_string()),
        }];

        let table = render_subscriptions(&subs);
        assert!(table.contains("42"));
        assert!(table.contains("orders/create"));
        assert!(table.contains("Total: 1 subscription(s)"));
    }

    #[test]
    fn test_report_json_shape() {
        let report = ReconciliationReport {
            address: Some("https://app.example.com/hooks".to_string()),
            outcomes: vec![(
                topic("orders/paid"),
                TopicOutcome::CreateFailed("HTTP 422".to_string()),
            )],
            stale: Vec::new(),
        };

        let json: serde_json::Value =
            serde_json::from_str(&to_json(&report, "test").expect("json")).expect("parse");
        assert_eq!(json["outcomes"][0][0], "orders/paid");
        assert_eq!(json["outcomes"][0][1]["outcome"], "create_failed");
        assert_eq!(json["outcomes"][0][1]["reason"], "HTTP 422");
    }
}
