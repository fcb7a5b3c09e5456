//! Configuration: environment defaults merged with database overrides.
//!
//! `Settings` is read once from the environment at startup and carries
//! credentials plus the compiled-in tunable defaults. `RuntimeConfig`
//! is the merged view: defaults overlaid with the `config` key-value
//! table, recomputed on every read so writes hot-reload.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::trade::dollars;
use crate::error::Result;
use crate::port::outbound::store::{ConfigStore, Store, TradeStore};

fn env_string(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

/// Process-level settings from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub kalshi_api_url: String,
    pub kalshi_api_key: String,
    pub kalshi_private_key_path: String,
    pub kalshi_private_key: String,
    pub kalshi_email: String,
    pub kalshi_password: String,
    pub anthropic_api_key: String,
    pub default_model: String,
    pub premium_model: String,
    pub screen_model: String,
    pub premium_volume_threshold: f64,
    pub email_api_key: String,
    pub email_from: String,
    /// Tunable defaults, overridable per-key in the database.
    pub defaults: RuntimeConfig,
}

impl Settings {
    /// Read all settings from the environment (after `dotenvy`).
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = RuntimeConfig {
            min_edge_threshold: env_parse("AUGUR_MIN_EDGE_THRESHOLD", 0.05),
            min_volume: env_parse("AUGUR_MIN_VOLUME", 10_000.0),
            kelly_fraction: env_parse("AUGUR_KELLY_FRACTION", 0.33),
            max_single_bet_fraction: env_parse("AUGUR_MAX_SINGLE_BET_FRACTION", 0.05),
            max_exposure_fraction: env_parse("AUGUR_MAX_EXPOSURE_FRACTION", 0.25),
            max_event_exposure_fraction: env_parse("AUGUR_MAX_EVENT_EXPOSURE_FRACTION", 0.10),
            re_estimate_trigger: env_parse("AUGUR_RE_ESTIMATE_TRIGGER", 0.05),
            bankroll: env_parse("AUGUR_BANKROLL", 10_000.0),
            initial_bankroll: env_parse("AUGUR_BANKROLL", 10_000.0),
            markets_per_platform: env_parse("AUGUR_MARKETS_PER_PLATFORM", 25),
            web_search_max_uses: env_parse("AUGUR_WEB_SEARCH_MAX_USES", 3),
            estimate_cache_hours: env_parse("AUGUR_ESTIMATE_CACHE_HOURS", 20.0),
            max_close_hours: env_parse("AUGUR_MAX_CLOSE_HOURS", 24),
            notification_email: env_string("AUGUR_NOTIFICATION_EMAIL"),
            notification_webhook: env_string("AUGUR_NOTIFICATION_WEBHOOK"),
            ..RuntimeConfig::default()
        };

        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "augur.db".to_string()),
            kalshi_api_url: std::env::var("KALSHI_API_URL")
                .unwrap_or_else(|_| "https://api.elections.kalshi.com/trade-api/v2".to_string()),
            kalshi_api_key: env_string("KALSHI_API_KEY"),
            kalshi_private_key_path: env_string("KALSHI_PRIVATE_KEY_PATH"),
            kalshi_private_key: env_string("KALSHI_PRIVATE_KEY"),
            kalshi_email: env_string("KALSHI_EMAIL"),
            kalshi_password: env_string("KALSHI_PASSWORD"),
            anthropic_api_key: env_string("ANTHROPIC_API_KEY"),
            default_model: std::env::var("AUGUR_DEFAULT_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-5".to_string()),
            premium_model: std::env::var("AUGUR_PREMIUM_MODEL")
                .unwrap_or_else(|_| "claude-opus-4-6".to_string()),
            screen_model: std::env::var("AUGUR_SCREEN_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5".to_string()),
            premium_volume_threshold: env_parse("AUGUR_PREMIUM_VOLUME_THRESHOLD", 100_000.0),
            email_api_key: env_string("RESEND_API_KEY"),
            email_from: env_string("AUGUR_EMAIL_FROM"),
            defaults,
        }
    }

    /// RSA credentials configured (required for order placement).
    #[must_use]
    pub fn kalshi_rsa_configured(&self) -> bool {
        !self.kalshi_api_key.is_empty()
            && (!self.kalshi_private_key_path.is_empty() || !self.kalshi_private_key.is_empty())
    }
}

/// The merged tunable configuration. Every field has a compiled-in
/// default and may be overridden by a row in the `config` table keyed
/// by the serde field name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub min_edge_threshold: f64,
    pub min_volume: f64,
    pub kelly_fraction: f64,
    pub max_single_bet_fraction: f64,
    pub max_exposure_fraction: f64,
    pub max_event_exposure_fraction: f64,
    pub re_estimate_trigger: f64,
    pub bankroll: f64,
    pub initial_bankroll: f64,
    pub markets_per_platform: usize,
    pub web_search_max_uses: u32,
    pub estimate_cache_hours: f64,
    pub price_check_enabled: bool,
    pub price_check_interval_hours: u64,
    pub resolution_check_enabled: bool,
    pub resolution_check_interval_hours: u64,
    pub trade_sync_enabled: bool,
    pub trade_sync_interval_hours: u64,
    pub auto_trade_enabled: bool,
    pub auto_trade_min_ev: f64,
    pub max_close_hours: i64,
    pub notifications_enabled: bool,
    pub notification_email: String,
    pub notification_webhook: String,
    pub notification_min_ev: f64,
    pub daily_digest_enabled: bool,
    pub daily_digest_hour: u32,
    /// Local hours (0-23) at which full scans run.
    pub scan_hours: Vec<u32>,
    pub use_premium_model: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            min_edge_threshold: 0.05,
            min_volume: 10_000.0,
            kelly_fraction: 0.33,
            max_single_bet_fraction: 0.05,
            max_exposure_fraction: 0.25,
            max_event_exposure_fraction: 0.10,
            re_estimate_trigger: 0.05,
            bankroll: 10_000.0,
            initial_bankroll: 10_000.0,
            markets_per_platform: 25,
            web_search_max_uses: 3,
            estimate_cache_hours: 20.0,
            price_check_enabled: false,
            price_check_interval_hours: 6,
            resolution_check_enabled: true,
            resolution_check_interval_hours: 6,
            trade_sync_enabled: false,
            trade_sync_interval_hours: 4,
            auto_trade_enabled: false,
            auto_trade_min_ev: 0.05,
            max_close_hours: 24,
            notifications_enabled: false,
            notification_email: String::new(),
            notification_webhook: String::new(),
            notification_min_ev: 0.08,
            daily_digest_enabled: true,
            daily_digest_hour: 16,
            scan_hours: vec![8, 14],
            use_premium_model: false,
        }
    }
}

impl RuntimeConfig {
    /// Current bankroll as money.
    #[must_use]
    pub fn bankroll_decimal(&self) -> Decimal {
        dollars(self.bankroll)
    }
}

/// Merges defaults with the database override table on every read.
#[derive(Clone)]
pub struct ConfigResolver {
    defaults: RuntimeConfig,
    store: Arc<dyn Store + Send + Sync>,
}

impl ConfigResolver {
    #[must_use]
    pub fn new(defaults: RuntimeConfig, store: Arc<dyn Store + Send + Sync>) -> Self {
        Self { defaults, store }
    }

    /// The merged view. A store failure degrades to pure defaults.
    pub async fn load(&self) -> RuntimeConfig {
        let overrides = match self.store.config_overrides().await {
            Ok(overrides) => overrides,
            Err(e) => {
                warn!(error = %e, "config read failed, using defaults");
                return self.defaults.clone();
            }
        };
        if overrides.is_empty() {
            return self.defaults.clone();
        }

        let mut merged = match serde_json::to_value(&self.defaults) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return self.defaults.clone(),
        };
        for (key, value) in overrides {
            if merged.contains_key(&key) {
                merged.insert(key, value);
            }
        }
        match serde_json::from_value(serde_json::Value::Object(merged)) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "config merge failed, using defaults");
                self.defaults.clone()
            }
        }
    }

    /// Persist override values.
    pub async fn write(&self, entries: &[(String, serde_json::Value)]) -> Result<()> {
        self.store.write_config(entries).await
    }

    /// Recompute `bankroll = initial_bankroll + Σ pnl` over closed
    /// trades with pnl set, persist it, and return the new value.
    /// Idempotent: re-running without new closures is a no-op.
    pub async fn recalculate_bankroll(&self) -> Result<Decimal> {
        let config = self.load().await;
        let initial = dollars(config.initial_bankroll);

        let closed = self.store.closed_trades(10_000).await?;
        let cumulative: Decimal = closed.iter().filter_map(|t| t.pnl).sum();
        let bankroll = initial + cumulative;

        self.write(&[
            (
                "initial_bankroll".to_string(),
                serde_json::json!(config.initial_bankroll),
            ),
            (
                "bankroll".to_string(),
                serde_json::json!(bankroll.to_f64().unwrap_or(0.0)),
            ),
        ])
        .await?;

        info!(%initial, pnl = %cumulative, %bankroll, "bankroll recalculated");
        Ok(bankroll)
    }
}
