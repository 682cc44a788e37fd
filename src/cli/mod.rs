//! CLI command implementations.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `serve` | Reconcile configured topics, then receive deliveries over HTTP |
//! | `reconcile` | Create missing webhook subscriptions and print the outcome |
//! | `list` | List webhook subscriptions registered with the shop |
//! | `config` | Show the effective configuration |
//!
//! # Example Usage
//!
//! ```bash
//! # Register subscriptions for configured and extra topics
//! shopify-connector reconcile --topic orders/paid --strict
//!
//! # Receive deliveries on port 8000
//! shopify-connector serve --port 8000
//! ```

mod config;
mod serve;
mod webhook;

pub use config::{cmd_config_show, render_config};
pub use serve::{DEFAULT_PORT, cmd_serve};
pub use webhook::{OutputFormat, cmd_list, cmd_reconcile};
