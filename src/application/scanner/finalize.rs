//! Per-market finalization: persist the estimate, compare against the
//! snapshot price, gate the recommendation, and auto-trade.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::application::calculator;
use crate::application::config::RuntimeConfig;
use crate::application::progress::MarketOutcome;
use crate::domain::estimate::EstimateOutput;
use crate::domain::id::ScanId;
use crate::domain::market::event_prefix;
use crate::domain::recommendation::{Direction, NewRecommendation, Recommendation};
use crate::domain::trade::{dollars, NewTrade, TradeSource};
use crate::error::Result;
use crate::port::outbound::exchange::OrderRequest;
use crate::port::outbound::notifier::{RecommendationAlert, TradeAlert};
use crate::port::outbound::store::{RecommendationStore, ResearchStore, TradeStore};

use super::prepare::PreparedMarket;
use super::{MarketResult, Scanner};

impl Scanner {
    /// Steps 5a-5d: persist estimate + cost, compute EV with the
    /// snapshot price (the first point where a price meets the
    /// estimate), swap in the recommendation, and run the auto-trade
    /// gate.
    pub(crate) async fn finalize_market(
        &self,
        config: &RuntimeConfig,
        scan_id: &ScanId,
        prepared: &PreparedMarket,
        output: EstimateOutput,
        model_used: &str,
    ) -> Result<MarketResult> {
        let estimate = self
            .store
            .insert_estimate(&prepared.market_id, &output, model_used)
            .await?;

        if output.estimated_cost > 0.0 {
            if let Err(e) = self
                .store
                .insert_cost_log(
                    model_used,
                    output.input_tokens,
                    output.output_tokens,
                    output.estimated_cost,
                    Some(scan_id),
                    Some(&prepared.market_id),
                )
                .await
            {
                debug!(market_id = %prepared.market_id, error = %e, "cost log failed");
            }
        }

        let Some(ev) =
            calculator::calculate_ev(output.probability, prepared.snapshot_price, self.exchange.venue())
        else {
            return Ok(MarketResult {
                outcome: MarketOutcome::Researched,
                recommendation: None,
                trade: None,
            });
        };

        if !calculator::should_recommend(
            ev.ev,
            Some(output.confidence),
            Some(output.probability),
            config.min_edge_threshold,
        ) {
            return Ok(MarketResult {
                outcome: MarketOutcome::Researched,
                recommendation: None,
                trade: None,
            });
        }

        let kelly = calculator::calculate_kelly(
            ev.edge,
            prepared.snapshot_price,
            ev.direction,
            output.confidence,
            config.kelly_fraction,
            config.max_single_bet_fraction,
        );

        let recommendation = self
            .store
            .replace_active_recommendation(NewRecommendation {
                market_id: prepared.market_id.clone(),
                estimate_id: estimate.id.clone(),
                snapshot_id: prepared.snapshot_id.clone(),
                direction: ev.direction,
                market_price: prepared.snapshot_price,
                ai_probability: output.probability,
                edge: ev.edge,
                ev: ev.ev,
                kelly_fraction: kelly,
            })
            .await?;

        info!(
            question = %prepared.question.chars().take(60).collect::<String>(),
            direction = %ev.direction,
            edge = ev.edge,
            ev = ev.ev,
            kelly,
            "recommendation created"
        );

        let alert = RecommendationAlert {
            question: prepared.question.clone(),
            venue_id: prepared.venue_id.clone(),
            outcome_label: prepared.outcome_label.clone(),
            direction: ev.direction,
            edge: ev.edge,
            ev: ev.ev,
            ai_probability: output.probability,
            market_price: prepared.snapshot_price,
            kelly_fraction: kelly,
        };

        // Auto-trade gate. Order failures are logged, never fatal.
        let trade = if config.auto_trade_enabled
            && ev.ev >= config.auto_trade_min_ev
            && self.exchange.supports_trading()
        {
            match self
                .place_auto_trade(
                    config,
                    &prepared.venue_id,
                    &prepared.question,
                    &recommendation,
                    prepared.snapshot_price,
                    kelly,
                )
                .await
            {
                Ok(trade) => trade,
                Err(e) => {
                    warn!(
                        venue_id = %prepared.venue_id,
                        error = %e,
                        "auto-trade failed"
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(MarketResult {
            outcome: MarketOutcome::Recommended,
            recommendation: Some(alert),
            trade,
        })
    }

    /// Size a position with the already-capped Kelly fraction, check
    /// exposure limits, convert to whole contracts at cent precision,
    /// place the limit buy, and persist the tracking trade.
    pub(crate) async fn place_auto_trade(
        &self,
        config: &RuntimeConfig,
        venue_id: &str,
        question: &str,
        recommendation: &Recommendation,
        price_yes: f64,
        kelly: f64,
    ) -> Result<Option<TradeAlert>> {
        let bankroll = config.bankroll;
        let max_bet = config.max_single_bet_fraction * bankroll;
        let bet_amount = (kelly * bankroll).min(max_bet);
        if bet_amount < 1.0 {
            debug!(venue_id, bet_amount, "bet too small, skipping");
            return Ok(None);
        }

        // Exposure caps: total deployed capital and per-event capital.
        let open_exposure = self.store.total_open_exposure().await?;
        let max_exposure = dollars(config.max_exposure_fraction * bankroll);
        if open_exposure + dollars(bet_amount) > max_exposure {
            warn!(
                %open_exposure,
                bet_amount,
                %max_exposure,
                "total exposure limit reached, skipping auto-trade"
            );
            return Ok(None);
        }
        let prefix = event_prefix(venue_id);
        let event_open = self
            .store
            .event_exposure(self.exchange.venue(), prefix)
            .await?;
        let max_event = dollars(config.max_event_exposure_fraction * bankroll);
        if event_open + dollars(bet_amount) > max_event {
            warn!(
                event = prefix,
                %event_open,
                bet_amount,
                %max_event,
                "event exposure limit reached, skipping auto-trade"
            );
            return Ok(None);
        }

        let direction = recommendation.direction;
        let entry_price = direction.entry_price(price_yes);
        if entry_price <= 0.0 {
            return Ok(None);
        }
        let contracts = (bet_amount / entry_price).floor() as i64;
        if contracts < 1 {
            debug!(venue_id, "position rounds to zero contracts, skipping");
            return Ok(None);
        }
        let yes_price_cents = ((price_yes * 100.0).round() as i64).clamp(1, 99);

        let ack = self
            .exchange
            .place_order(&OrderRequest {
                ticker: venue_id.to_string(),
                side: direction,
                count: contracts,
                yes_price_cents,
            })
            .await?;

        let amount = dollars(contracts as f64 * entry_price);
        self.store
            .insert_trade(NewTrade {
                market_id: recommendation.market_id.clone(),
                recommendation_id: Some(recommendation.id.clone()),
                venue: self.exchange.venue(),
                direction,
                entry_price,
                amount,
                shares: Some(contracts as f64),
                fees_paid: Decimal::ZERO,
                notes: Some(format!("[auto-trade] limit buy {contracts}x {venue_id}")),
                source: TradeSource::ApiSync,
                venue_trade_id: Some(format!("order_{}", ack.order_id)),
            })
            .await?;

        info!(
            venue_id,
            direction = %direction,
            contracts,
            yes_price_cents,
            amount = %amount,
            order_id = %ack.order_id,
            "auto-trade placed"
        );

        Ok(Some(TradeAlert {
            question: question.to_string(),
            venue_id: venue_id.to_string(),
            direction,
            amount,
            contracts,
            price_cents: match direction {
                Direction::Yes => yes_price_cents,
                Direction::No => 100 - yes_price_cents,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::ToPrimitive;

    #[test]
    fn contract_sizing_matches_happy_path() {
        // Scenario 1: kelly capped at 0.05 of $1000 -> $50 at 40¢
        // buys 125 contracts.
        let bet: f64 = (0.05f64 * 1000.0).min(0.05 * 1000.0);
        let contracts = (bet / 0.40).floor() as i64;
        assert_eq!(contracts, 125);
        let cents = ((0.40f64 * 100.0).round() as i64).clamp(1, 99);
        assert_eq!(cents, 40);
        let amount = dollars(contracts as f64 * 0.40);
        assert_eq!(amount.to_f64().unwrap(), 50.0);
    }
}
