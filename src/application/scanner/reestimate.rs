//! Re-estimation sweep for markets whose price moved.

use tracing::{error, info};

use crate::application::calculator;
use crate::domain::estimate::BlindMarketInput;
use crate::domain::market::{Market, Snapshot};
use crate::domain::recommendation::NewRecommendation;
use crate::error::Result;
use crate::port::outbound::store::{MarketStore, RecommendationStore, ResearchStore};

use super::Scanner;

impl Scanner {
    /// Re-estimate every active market whose last two snapshots differ
    /// by at least the configured trigger. Each market runs the same
    /// estimate → EV → recommendation path as a scan, against the
    /// fresh snapshot. Returns the number of markets re-estimated.
    pub async fn reestimate_moved(&self) -> Result<usize> {
        let config = self.config.load().await;
        let moved = self
            .store
            .markets_with_price_movement(config.re_estimate_trigger, 500)
            .await?;

        if moved.is_empty() {
            info!(
                threshold = config.re_estimate_trigger,
                "no markets with significant price movement"
            );
            return Ok(0);
        }
        info!(count = moved.len(), "re-estimating moved markets");

        let mut re_estimated = 0;
        for (market, old_snapshot, new_snapshot) in moved {
            match self
                .reestimate_one(&config, &market, &old_snapshot, &new_snapshot)
                .await
            {
                Ok(()) => re_estimated += 1,
                Err(e) => {
                    error!(market_id = %market.id, error = %e, "re-estimation failed");
                }
            }
        }

        info!(re_estimated, "re-estimation sweep complete");
        Ok(re_estimated)
    }

    async fn reestimate_one(
        &self,
        config: &crate::application::config::RuntimeConfig,
        market: &Market,
        old_snapshot: &Snapshot,
        new_snapshot: &Snapshot,
    ) -> Result<()> {
        let blind_input = BlindMarketInput {
            question: market.question.clone(),
            resolution_criteria: market.resolution_criteria.clone(),
            close_at: market.close_at.map(|dt| dt.to_rfc3339()),
            category: market.category.clone(),
            sport: None,
            calibration_feedback: None,
        };

        // Volume from the fresh snapshot, for model selection only.
        let volume = new_snapshot.volume;
        let premium = config.use_premium_model;

        let _permit = self
            .research_semaphore
            .acquire()
            .await
            .map_err(|_| crate::error::Error::Execution("semaphore closed".to_string()))?;
        let output = self.estimator.estimate(&blind_input, volume, premium).await?;
        drop(_permit);

        let model = self.estimator.select_model(volume, premium);
        let estimate = self
            .store
            .insert_estimate(&market.id, &output, &model)
            .await?;
        if output.estimated_cost > 0.0 {
            let _ = self
                .store
                .insert_cost_log(
                    &model,
                    output.input_tokens,
                    output.output_tokens,
                    output.estimated_cost,
                    None,
                    Some(&market.id),
                )
                .await;
        }

        // EV against the fresh price.
        if let Some(ev) = calculator::calculate_ev(
            output.probability,
            new_snapshot.price_yes,
            self.exchange.venue(),
        ) {
            if calculator::should_recommend(
                ev.ev,
                Some(output.confidence),
                Some(output.probability),
                config.min_edge_threshold,
            ) {
                let kelly = calculator::calculate_kelly(
                    ev.edge,
                    new_snapshot.price_yes,
                    ev.direction,
                    output.confidence,
                    config.kelly_fraction,
                    config.max_single_bet_fraction,
                );
                self.store
                    .replace_active_recommendation(NewRecommendation {
                        market_id: market.id.clone(),
                        estimate_id: estimate.id,
                        snapshot_id: new_snapshot.id.clone(),
                        direction: ev.direction,
                        market_price: new_snapshot.price_yes,
                        ai_probability: output.probability,
                        edge: ev.edge,
                        ev: ev.ev,
                        kelly_fraction: kelly,
                    })
                    .await?;
            }
        }

        info!(
            question = %market.question.chars().take(60).collect::<String>(),
            old_price = old_snapshot.price_yes,
            new_price = new_snapshot.price_yes,
            probability = output.probability,
            "re-estimated"
        );
        Ok(())
    }
}
