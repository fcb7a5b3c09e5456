//! Post-scan sweep: place orders for active recommendations that have
//! no trade yet.
//!
//! Recommendations outlive the scan that created them and prices
//! drift, so the sweep re-verifies EV against the latest snapshot and
//! sizes conservatively (medium confidence) before placing an order.

use tracing::{debug, info, warn};

use crate::application::calculator;
use crate::application::config::RuntimeConfig;
use crate::domain::estimate::Confidence;
use crate::domain::market::MarketStatus;
use crate::error::Result;
use crate::port::outbound::notifier::TradeAlert;
use crate::port::outbound::store::{MarketStore, RecommendationStore};

use super::Scanner;

impl Scanner {
    /// Sweep active recommendations whose market has no associated
    /// trade. Preconditions per recommendation: market still active,
    /// EV re-verified at the latest snapshot still clears the
    /// auto-trade floor.
    pub(crate) async fn sweep_untraded(
        &self,
        config: &RuntimeConfig,
    ) -> Result<Vec<TradeAlert>> {
        if !self.exchange.supports_trading() {
            return Ok(Vec::new());
        }

        let candidates = self.store.untraded_active_recommendations().await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        info!(count = candidates.len(), "sweeping untraded recommendations");

        let mut placed = Vec::new();
        for recommendation in candidates {
            let market = match self.store.get_market(&recommendation.market_id).await {
                Ok(Some(market)) if market.status == MarketStatus::Active => market,
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "sweep market lookup failed");
                    continue;
                }
            };

            // Re-verify against the LATEST price, not the one the
            // recommendation was created from.
            let Some(snapshot) = self.store.latest_snapshot(&market.id).await? else {
                continue;
            };
            let Some(ev) = calculator::calculate_ev(
                recommendation.ai_probability,
                snapshot.price_yes,
                self.exchange.venue(),
            ) else {
                debug!(venue_id = %market.venue_id, "edge gone, skipping sweep order");
                continue;
            };
            if ev.ev < config.auto_trade_min_ev || ev.direction != recommendation.direction {
                debug!(
                    venue_id = %market.venue_id,
                    ev = ev.ev,
                    "sweep EV below floor or direction flipped, skipping"
                );
                continue;
            }

            // Conservative sizing: the estimate may be stale, so the
            // confidence multiplier is forced to medium.
            let kelly = calculator::calculate_kelly(
                ev.edge,
                snapshot.price_yes,
                ev.direction,
                Confidence::Medium,
                config.kelly_fraction,
                config.max_single_bet_fraction,
            );
            if kelly <= 0.0 {
                continue;
            }

            match self
                .place_auto_trade(
                    config,
                    &market.venue_id,
                    &market.question,
                    &recommendation,
                    snapshot.price_yes,
                    kelly,
                )
                .await
            {
                Ok(Some(alert)) => placed.push(alert),
                Ok(None) => {}
                Err(e) => {
                    warn!(venue_id = %market.venue_id, error = %e, "sweep order failed");
                }
            }
        }

        info!(placed = placed.len(), "sweep complete");
        Ok(placed)
    }
}
