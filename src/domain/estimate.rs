//! Blind estimation domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{EstimateId, MarketId};

/// Model-reported confidence in an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Kelly sizing multiplier applied on top of the fractional Kelly.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::High => 1.0,
            Self::Medium => 0.6,
            Self::Low => 0.3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Normalize a model-emitted confidence label. Unknown values map
    /// to `Medium`.
    #[must_use]
    pub fn normalize(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// What the estimator is allowed to see.
///
/// This type is the enforcement point for blind estimation: it has no
/// price, volume, liquidity, or order-book fields, so no call path can
/// leak market signals into the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlindMarketInput {
    pub question: String,
    pub resolution_criteria: Option<String>,
    /// RFC 3339 close timestamp, formatted for the prompt.
    pub close_at: Option<String>,
    pub category: Option<String>,
    pub sport: Option<String>,
    /// Opaque calibration summary carried through verbatim.
    pub calibration_feedback: Option<String>,
}

/// Structured output of one blind estimation call.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateOutput {
    /// Probability of YES, clamped into [0.01, 0.99].
    pub probability: f64,
    pub confidence: Confidence,
    pub reasoning: String,
    pub key_evidence: Vec<String>,
    pub key_uncertainties: Vec<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Estimated API cost in USD for this call.
    pub estimated_cost: f64,
}

/// A persisted estimate row.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub id: EstimateId,
    pub market_id: MarketId,
    pub probability: f64,
    pub confidence: Confidence,
    pub reasoning: String,
    pub key_evidence: Vec<String>,
    pub key_uncertainties: Vec<String>,
    pub model_used: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost: f64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_multipliers() {
        assert_eq!(Confidence::High.multiplier(), 1.0);
        assert_eq!(Confidence::Medium.multiplier(), 0.6);
        assert_eq!(Confidence::Low.multiplier(), 0.3);
    }

    #[test]
    fn normalize_handles_case_and_unknowns() {
        assert_eq!(Confidence::normalize("HIGH"), Confidence::High);
        assert_eq!(Confidence::normalize(" low "), Confidence::Low);
        assert_eq!(Confidence::normalize("very sure"), Confidence::Medium);
        assert_eq!(Confidence::normalize(""), Confidence::Medium);
    }

    #[test]
    fn blind_input_serializes_without_price_fields() {
        let input = BlindMarketInput {
            question: "Will X happen?".to_string(),
            resolution_criteria: Some("Resolves YES if X.".to_string()),
            close_at: Some("2026-03-01T00:00:00Z".to_string()),
            category: Some("Economics".to_string()),
            sport: None,
            calibration_feedback: None,
        };
        let json = serde_json::to_string(&input).unwrap();
        assert!(!json.contains("price"));
        assert!(!json.contains("volume"));
        assert!(!json.contains("liquidity"));
    }
}
