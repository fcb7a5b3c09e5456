//! Per-market preparation: upsert, snapshot, cache check, blind input,
//! pre-screen.

use chrono::{Duration, Utc};
use tracing::debug;

use crate::application::config::RuntimeConfig;
use crate::domain::estimate::BlindMarketInput;
use crate::domain::id::{MarketId, SnapshotId};
use crate::domain::market::NormalizedMarket;
use crate::error::Result;
use crate::port::outbound::store::{MarketStore, ResearchStore};

use super::Scanner;

/// A market ready for estimation. Carries everything finalize needs
/// without re-reading the exchange, plus the snapshot price that the
/// EV comparison will use. The blind input holds no price data.
#[derive(Debug, Clone)]
pub struct PreparedMarket {
    pub market_id: MarketId,
    pub snapshot_id: SnapshotId,
    /// YES price at the snapshot; the earliest point a price may
    /// touch the estimate, inside finalize.
    pub snapshot_price: f64,
    pub blind_input: BlindMarketInput,
    /// For model selection only; never enters the prompt.
    pub volume: Option<f64>,
    pub question: String,
    pub venue_id: String,
    pub outcome_label: Option<String>,
}

impl Scanner {
    /// Steps 3a-3e of the scan: upsert metadata, snapshot the price,
    /// skip cached or screened-out markets, and build the blind input.
    /// Returns `None` when the market should be skipped.
    pub(crate) async fn prepare_market(
        &self,
        config: &RuntimeConfig,
        market: &NormalizedMarket,
        calibration_feedback: Option<String>,
    ) -> Result<Option<PreparedMarket>> {
        let market_row = self.store.upsert_market(market).await?;

        // No usable price: nothing to compare an estimate against.
        if !market.has_price() {
            debug!(venue_id = %market.venue_id, "skipping market without price");
            return Ok(None);
        }

        let snapshot = self
            .store
            .insert_snapshot(
                &market_row.id,
                market.price_yes,
                None,
                Some(market.volume),
                Some(market.liquidity),
            )
            .await?;

        // Estimate cache: skip markets with a fresh estimate.
        if let Some(latest) = self.store.latest_estimate(&market_row.id).await? {
            let age = Utc::now() - latest.created_at;
            let max_age = Duration::seconds((config.estimate_cache_hours * 3600.0) as i64);
            if age <= max_age {
                debug!(
                    question = %market.question.chars().take(60).collect::<String>(),
                    "skipping, recent estimate exists"
                );
                return Ok(None);
            }
        }

        let blind_input = BlindMarketInput {
            question: market.question.clone(),
            resolution_criteria: market.resolution_criteria.clone(),
            close_at: market.close_at.map(|dt| dt.to_rfc3339()),
            category: market.category.clone(),
            sport: market.sport.clone(),
            calibration_feedback,
        };

        // Cheap worth-researching gate (fails open on error).
        if !self.estimator.screen(&blind_input).await {
            debug!(
                question = %market.question.chars().take(60).collect::<String>(),
                "screened out"
            );
            return Ok(None);
        }

        Ok(Some(PreparedMarket {
            market_id: market_row.id,
            snapshot_id: snapshot.id,
            snapshot_price: snapshot.price_yes,
            blind_input,
            volume: Some(market.volume),
            question: market.question.clone(),
            venue_id: market.venue_id.clone(),
            outcome_label: market_row.outcome_label,
        }))
    }
}
