//! Blind estimation port.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::estimate::{BlindMarketInput, EstimateOutput};
use crate::error::Result;

/// A price-blind probability estimator.
///
/// Implementations receive only the [`BlindMarketInput`] metadata; the
/// `volume` parameter exists solely for model-tier selection and must
/// never reach the prompt.
#[async_trait]
pub trait Estimator: Send + Sync {
    /// The model that would be used for the given selection inputs.
    fn select_model(&self, volume: Option<f64>, premium: bool) -> String;

    /// Produce a probability estimate for one market.
    async fn estimate(
        &self,
        input: &BlindMarketInput,
        volume: Option<f64>,
        premium: bool,
    ) -> Result<EstimateOutput>;

    /// Submit one batch job for many markets and return results keyed
    /// by the caller-chosen custom id. Succeeded entries only; callers
    /// fall back to [`Estimator::estimate`] for anything missing.
    async fn estimate_batch(
        &self,
        items: &[(String, BlindMarketInput)],
    ) -> Result<HashMap<String, EstimateOutput>>;

    /// Cheap pre-screen: is this market worth researching at all?
    /// Fails open: any error means `true`.
    async fn screen(&self, input: &BlindMarketInput) -> bool;
}
