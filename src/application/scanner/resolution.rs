//! Resolution pass: detect resolved and voided markets, settle trades,
//! and record performance. Makes no model calls.

use tracing::{error, info, warn};

use crate::application::calculator;
use crate::domain::market::{Market, MarketStatus};
use crate::domain::trade::dollars;
use crate::error::Result;
use crate::port::outbound::notifier::ResolutionAlert;
use crate::port::outbound::store::{
    MarketStore, NewPerformance, PerformanceStore, RecommendationStore, ResearchStore,
    TradeStore,
};

use super::Scanner;

/// Summary of one resolution pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionOutcome {
    pub markets_checked: usize,
    pub markets_resolved: usize,
    pub markets_cancelled: usize,
}

impl Scanner {
    /// Check every active market against the venue. Voided markets
    /// close with recommendations expired and open trades cancelled
    /// (no P&L); resolved markets settle trades, write an idempotent
    /// performance row, and move recommendations to resolved.
    pub async fn check_resolutions(&self) -> Result<ResolutionOutcome> {
        let config = self.config.load().await;
        let active = self
            .store
            .list_markets(
                Some(self.exchange.venue()),
                Some(MarketStatus::Active),
                500,
            )
            .await?;
        if active.is_empty() {
            return Ok(ResolutionOutcome::default());
        }

        let venue_ids: Vec<String> = active.iter().map(|m| m.venue_id.clone()).collect();
        info!(count = venue_ids.len(), "checking resolutions");
        let results = self.exchange.check_resolutions_batch(&venue_ids).await;

        let mut outcome = ResolutionOutcome {
            markets_checked: results.len(),
            ..ResolutionOutcome::default()
        };
        let mut alerts = Vec::new();

        for market in &active {
            let Some(resolution) = results.get(&market.venue_id) else {
                continue;
            };

            if resolution.cancelled {
                if let Err(e) = self.cancel_market(market).await {
                    error!(market_id = %market.id, error = %e, "cancel handling failed");
                    continue;
                }
                outcome.markets_cancelled += 1;
                info!(
                    question = %market.question.chars().take(60).collect::<String>(),
                    "market cancelled/voided"
                );
            } else if resolution.resolved {
                let Some(market_outcome) = resolution.outcome else {
                    continue;
                };
                match self
                    .resolve_market(&config, market, market_outcome)
                    .await
                {
                    Ok(alert) => {
                        outcome.markets_resolved += 1;
                        if let Some(alert) = alert {
                            alerts.push(alert);
                        }
                        info!(
                            question = %market.question.chars().take(60).collect::<String>(),
                            outcome = if market_outcome { "YES" } else { "NO" },
                            "market resolved"
                        );
                    }
                    Err(e) => {
                        error!(market_id = %market.id, error = %e, "resolution handling failed");
                    }
                }
            }
        }

        // Closed trades change realized P&L; keep the bankroll
        // coherent with them.
        if outcome.markets_resolved > 0 {
            if let Err(e) = self.config.recalculate_bankroll().await {
                warn!(error = %e, "bankroll recalculation failed");
            }
        }

        if !alerts.is_empty() {
            self.notifier.resolutions(&alerts).await;
        }

        info!(
            checked = outcome.markets_checked,
            resolved = outcome.markets_resolved,
            cancelled = outcome.markets_cancelled,
            "resolution check complete"
        );
        Ok(outcome)
    }

    /// Voided market: close it, expire recommendations, cancel open
    /// trades with zero P&L.
    async fn cancel_market(&self, market: &Market) -> Result<()> {
        self.store
            .update_market_status(&market.id, MarketStatus::Closed, None)
            .await?;
        self.store.expire_recommendations(&market.id).await?;
        self.store.cancel_trades_for_market(&market.id).await?;
        Ok(())
    }

    /// Resolved market: set the terminal status, close open trades
    /// with computed P&L, record performance once, and resolve
    /// recommendations.
    pub(crate) async fn resolve_market(
        &self,
        config: &crate::application::config::RuntimeConfig,
        market: &Market,
        outcome: bool,
    ) -> Result<Option<ResolutionAlert>> {
        self.store
            .update_market_status(&market.id, MarketStatus::Resolved, Some(outcome))
            .await?;

        let exit_price = if outcome { 1.0 } else { 0.0 };
        let closed = self
            .store
            .close_trades_for_market(&market.id, exit_price)
            .await?;
        let realized_pnl = (!closed.is_empty())
            .then(|| closed.iter().filter_map(|t| t.pnl).sum::<rust_decimal::Decimal>());

        let estimate = self.store.latest_estimate(&market.id).await?;
        let snapshot = self.store.latest_snapshot(&market.id).await?;
        let recommendation = self.store.latest_recommendation(&market.id).await?;

        let mut alert = None;
        if let (Some(estimate), Some(snapshot)) = (estimate, snapshot) {
            let brier = calculator::brier_score(estimate.probability, outcome);

            // What the engine would have made following the
            // recommendation's sizing, traded or not.
            let simulated_pnl = recommendation.as_ref().map(|rec| {
                dollars(calculator::calculate_pnl(
                    rec.market_price,
                    rec.direction,
                    outcome,
                    rec.kelly_fraction,
                    config.bankroll,
                ))
            });

            self.store
                .insert_performance(NewPerformance {
                    market_id: market.id.clone(),
                    recommendation_id: recommendation.as_ref().map(|r| r.id.clone()),
                    ai_probability: estimate.probability,
                    market_price: snapshot.price_yes,
                    actual_outcome: outcome,
                    pnl: realized_pnl,
                    simulated_pnl,
                    brier_score: brier,
                })
                .await?;

            alert = Some(ResolutionAlert {
                question: market.question.clone(),
                outcome,
                pnl: realized_pnl,
                brier_score: brier,
            });
        }

        self.store.resolve_recommendations(&market.id).await?;
        Ok(alert)
    }
}
