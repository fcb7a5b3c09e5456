//! Outbound adapters: venue, model provider, persistence, alerting.

pub mod anthropic;
pub mod http;
pub mod kalshi;
pub mod notifier;
pub mod sqlite;
