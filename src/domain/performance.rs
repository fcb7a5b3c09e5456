//! Resolved-forecast performance records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::id::{MarketId, RecommendationId};

/// Exactly one row per resolved market: the forecast, the price at
/// forecast time, the outcome, and realized/simulated P&L.
#[derive(Debug, Clone)]
pub struct PerformanceRecord {
    pub id: String,
    pub market_id: MarketId,
    pub recommendation_id: Option<RecommendationId>,
    pub ai_probability: f64,
    /// YES price recorded at forecast time.
    pub market_price: f64,
    pub actual_outcome: bool,
    pub pnl: Option<Decimal>,
    pub simulated_pnl: Option<Decimal>,
    pub brier_score: f64,
    pub resolved_at: DateTime<Utc>,
}

impl PerformanceRecord {
    /// Whether the forecast called the right side of 50%.
    #[must_use]
    pub fn directionally_correct(&self) -> bool {
        (self.ai_probability >= 0.5) == self.actual_outcome
    }
}

/// One bin of the calibration curve: mean prediction vs. observed
/// frequency for forecasts falling in [bucket_min, bucket_max).
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationBucket {
    pub bucket_min: f64,
    pub bucket_max: f64,
    pub predicted_avg: f64,
    pub actual_frequency: f64,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(probability: f64, outcome: bool) -> PerformanceRecord {
        PerformanceRecord {
            id: "p1".to_string(),
            market_id: MarketId::from("m1"),
            recommendation_id: None,
            ai_probability: probability,
            market_price: 0.5,
            actual_outcome: outcome,
            pnl: None,
            simulated_pnl: None,
            brier_score: 0.0,
            resolved_at: Utc::now(),
        }
    }

    #[test]
    fn directional_correctness() {
        assert!(record(0.7, true).directionally_correct());
        assert!(record(0.3, false).directionally_correct());
        assert!(!record(0.7, false).directionally_correct());
        // 0.5 counts as a YES call.
        assert!(record(0.5, true).directionally_correct());
    }
}
