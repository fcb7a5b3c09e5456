//! Recommendation domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{EstimateId, MarketId, RecommendationId, SnapshotId};

/// Bet direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Yes,
    No,
}

impl Direction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            _ => None,
        }
    }

    /// Entry price for this direction given the YES price.
    #[must_use]
    pub fn entry_price(self, price_yes: f64) -> f64 {
        match self {
            Self::Yes => price_yes,
            Self::No => 1.0 - price_yes,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a recommendation.
///
/// A new active recommendation for a market expires the prior active
/// one; resolution of the market moves the survivor to `Resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Active,
    Expired,
    Resolved,
}

impl RecommendationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Resolved => "resolved",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// A bet recommendation produced when the EV gate passes.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub market_id: MarketId,
    pub estimate_id: EstimateId,
    pub snapshot_id: SnapshotId,
    pub direction: Direction,
    /// YES price at the snapshot the recommendation was computed from.
    pub market_price: f64,
    pub ai_probability: f64,
    pub edge: f64,
    pub ev: f64,
    pub kelly_fraction: f64,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields of a new recommendation; the store assigns id/status/time.
#[derive(Debug, Clone)]
pub struct NewRecommendation {
    pub market_id: MarketId,
    pub estimate_id: EstimateId,
    pub snapshot_id: SnapshotId,
    pub direction: Direction,
    pub market_price: f64,
    pub ai_probability: f64,
    pub edge: f64,
    pub ev: f64,
    pub kelly_fraction: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_price_flips_for_no() {
        assert_eq!(Direction::Yes.entry_price(0.4), 0.4);
        assert!((Direction::No.entry_price(0.4) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn direction_parse() {
        assert_eq!(Direction::parse("YES"), Some(Direction::Yes));
        assert_eq!(Direction::parse("no"), Some(Direction::No));
        assert_eq!(Direction::parse("maybe"), None);
    }
}
