//! Outbound alerting port.
//!
//! Notifications are best-effort: failures are reported per channel
//! and never propagate into the pipeline.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::recommendation::Direction;

/// A recommendation summarized for an alert.
#[derive(Debug, Clone)]
pub struct RecommendationAlert {
    pub question: String,
    pub venue_id: String,
    pub outcome_label: Option<String>,
    pub direction: Direction,
    pub edge: f64,
    pub ev: f64,
    pub ai_probability: f64,
    pub market_price: f64,
    pub kelly_fraction: f64,
}

/// An auto-placed trade summarized for an alert.
#[derive(Debug, Clone)]
pub struct TradeAlert {
    pub question: String,
    pub venue_id: String,
    pub direction: Direction,
    pub amount: Decimal,
    pub contracts: i64,
    pub price_cents: i64,
}

/// A resolved market summarized for an alert.
#[derive(Debug, Clone)]
pub struct ResolutionAlert {
    pub question: String,
    pub outcome: bool,
    pub pnl: Option<Decimal>,
    pub brier_score: f64,
}

/// Scan statistics reported alongside recommendation alerts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanStats {
    pub markets_found: usize,
    pub markets_researched: usize,
    pub recommendations_created: usize,
    pub duration_seconds: f64,
}

/// Daily digest content.
#[derive(Debug, Clone, Default)]
pub struct DigestReport {
    pub open_positions: usize,
    pub total_exposure: Decimal,
    pub bankroll: Decimal,
    pub resolved_today: usize,
    pub pnl_today: Decimal,
    pub active_recommendations: usize,
}

/// Per-channel delivery outcome, keyed by channel name.
pub type ChannelResults = HashMap<String, bool>;

/// Outbound alert sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// High-EV recommendations found by a scan.
    async fn scan_results(
        &self,
        recommendations: &[RecommendationAlert],
        stats: ScanStats,
    ) -> ChannelResults;

    /// Orders placed by the post-scan sweep.
    async fn sweep_trades(&self, trades: &[TradeAlert]) -> ChannelResults;

    /// Markets resolved by a resolution pass.
    async fn resolutions(&self, resolved: &[ResolutionAlert]) -> ChannelResults;

    /// A scheduled job failed.
    async fn job_failure(&self, job: &str, error: &str) -> ChannelResults;

    /// Daily portfolio digest.
    async fn daily_digest(&self, digest: &DigestReport) -> ChannelResults;
}

/// Notifier that drops everything; used when notifications are
/// disabled and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn scan_results(
        &self,
        _recommendations: &[RecommendationAlert],
        _stats: ScanStats,
    ) -> ChannelResults {
        ChannelResults::new()
    }

    async fn sweep_trades(&self, _trades: &[TradeAlert]) -> ChannelResults {
        ChannelResults::new()
    }

    async fn resolutions(&self, _resolved: &[ResolutionAlert]) -> ChannelResults {
        ChannelResults::new()
    }

    async fn job_failure(&self, _job: &str, _error: &str) -> ChannelResults {
        ChannelResults::new()
    }

    async fn daily_digest(&self, _digest: &DigestReport) -> ChannelResults {
        ChannelResults::new()
    }
}
