//! Component wiring shared by all commands.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::adapter::outbound::anthropic::{AnthropicResearcher, ResearcherConfig};
use crate::adapter::outbound::kalshi::{BearerSession, KalshiAuth, KalshiClient, RsaSigner};
use crate::adapter::outbound::notifier::ReloadingNotifier;
use crate::adapter::outbound::sqlite::{create_pool, run_migrations, SqliteStore};
use crate::application::config::{ConfigResolver, Settings};
use crate::application::progress::ScanProgress;
use crate::application::reconciler::TradeReconciler;
use crate::application::scanner::{Scanner, STALE_SCAN_MINUTES};
use crate::error::Result;
use crate::port::outbound::estimator::Estimator;
use crate::port::outbound::exchange::Exchange;
use crate::port::outbound::notifier::Notifier;
use crate::port::outbound::store::Store;

/// Fully wired application.
pub struct App {
    pub settings: Settings,
    pub store: Arc<dyn Store + Send + Sync>,
    pub exchange: Arc<dyn Exchange>,
    pub estimator: Arc<dyn Estimator>,
    pub config: ConfigResolver,
    pub progress: Arc<ScanProgress>,
    pub notifier: Arc<dyn Notifier>,
    pub scanner: Scanner,
    pub reconciler: Arc<TradeReconciler>,
}

fn build_exchange(settings: &Settings) -> Result<KalshiClient> {
    let auth = if settings.kalshi_rsa_configured() {
        let pem = if !settings.kalshi_private_key_path.is_empty() {
            std::fs::read_to_string(&settings.kalshi_private_key_path)?
        } else {
            settings.kalshi_private_key.clone()
        };
        let signer = RsaSigner::new(settings.kalshi_api_key.clone(), &pem)?;
        info!("venue auth: RSA-PSS signing");
        KalshiAuth::Rsa(signer)
    } else if !settings.kalshi_email.is_empty() && !settings.kalshi_password.is_empty() {
        info!("venue auth: bearer login (read-only, no order placement)");
        KalshiAuth::Bearer(BearerSession::new(
            settings.kalshi_email.clone(),
            settings.kalshi_password.clone(),
        ))
    } else {
        KalshiAuth::None
    };
    Ok(KalshiClient::new(settings.kalshi_api_url.clone(), auth))
}

impl App {
    /// Wire everything up. With `degraded_ok`, a failing database
    /// leaves the process running (jobs will fail until it returns);
    /// otherwise the error propagates.
    pub fn bootstrap(database_override: Option<String>, degraded_ok: bool) -> Result<Self> {
        let mut settings = Settings::from_env();
        if let Some(database) = database_override {
            settings.database_url = database;
        }

        let pool = create_pool(&settings.database_url)?;
        if let Err(e) = run_migrations(&pool) {
            if degraded_ok {
                error!(error = %e, "database unavailable, starting degraded");
            } else {
                return Err(e);
            }
        }
        let store: Arc<dyn Store + Send + Sync> = Arc::new(SqliteStore::new(pool));

        let config = ConfigResolver::new(settings.defaults.clone(), store.clone());

        let exchange: Arc<dyn Exchange> = Arc::new(build_exchange(&settings)?);

        let estimator: Arc<dyn Estimator> = Arc::new(AnthropicResearcher::new(
            ResearcherConfig {
                api_key: settings.anthropic_api_key.clone(),
                default_model: settings.default_model.clone(),
                premium_model: settings.premium_model.clone(),
                screen_model: settings.screen_model.clone(),
                premium_volume_threshold: settings.premium_volume_threshold,
                web_search_max_uses: settings.defaults.web_search_max_uses,
                batch_poll_interval: Duration::from_secs(10),
                batch_timeout: Duration::from_secs(30 * 60),
                ..ResearcherConfig::default()
            },
        ));

        let notifier: Arc<dyn Notifier> = Arc::new(ReloadingNotifier::new(
            config.clone(),
            settings.email_api_key.clone(),
            settings.email_from.clone(),
        ));

        let progress = Arc::new(ScanProgress::new());
        // Recover from a crash that left a scan flagged running.
        if progress.reset_stale(STALE_SCAN_MINUTES) {
            info!("stale scan state reset");
        }

        let scanner = Scanner::new(
            store.clone(),
            exchange.clone(),
            estimator.clone(),
            notifier.clone(),
            config.clone(),
            progress.clone(),
        );
        let reconciler = Arc::new(TradeReconciler::new(store.clone(), exchange.clone()));

        Ok(Self {
            settings,
            store,
            exchange,
            estimator,
            config,
            progress,
            notifier,
            scanner,
            reconciler,
        })
    }
}
