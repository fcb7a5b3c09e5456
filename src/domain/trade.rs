//! Trade domain types.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{MarketId, RecommendationId, TradeId};
use super::market::Venue;
use super::recommendation::Direction;

/// Lifecycle of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
    Cancelled,
}

impl TradeStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// How a trade entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSource {
    Manual,
    ApiSync,
}

impl TradeSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::ApiSync => "api_sync",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "api_sync" => Some(Self::ApiSync),
            _ => None,
        }
    }
}

/// A position held (or once held) in a market.
#[derive(Debug, Clone)]
pub struct Trade {
    pub id: TradeId,
    pub market_id: MarketId,
    pub recommendation_id: Option<RecommendationId>,
    pub venue: Venue,
    pub direction: Direction,
    /// Entry price for the side actually bought (YES price for YES,
    /// NO price for NO).
    pub entry_price: f64,
    /// Capital committed, in dollars.
    pub amount: Decimal,
    pub shares: Option<f64>,
    pub fees_paid: Decimal,
    pub status: TradeStatus,
    pub exit_price: Option<f64>,
    pub pnl: Option<Decimal>,
    pub notes: Option<String>,
    pub source: TradeSource,
    /// Venue-side identity: `order_<id>` for our resting orders,
    /// `fill_<id>` once reconciled against an executed fill.
    pub venue_trade_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Fields of a new trade; the store assigns id/status/time.
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub market_id: MarketId,
    pub recommendation_id: Option<RecommendationId>,
    pub venue: Venue,
    pub direction: Direction,
    pub entry_price: f64,
    pub amount: Decimal,
    pub shares: Option<f64>,
    pub fees_paid: Decimal,
    pub notes: Option<String>,
    pub source: TradeSource,
    pub venue_trade_id: Option<String>,
}

/// Convert a float dollar value to `Decimal`, rounded to 4 places.
///
/// Non-finite inputs map to zero; monetary values at this boundary are
/// already products of bounded prices and counts.
#[must_use]
pub fn dollars(value: f64) -> Decimal {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    Decimal::from_f64(rounded).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn dollars_rounds_to_four_places() {
        assert_eq!(dollars(74.499999999), dec!(74.5));
        assert_eq!(dollars(0.123456), dec!(0.1235));
    }

    #[test]
    fn dollars_handles_non_finite() {
        assert_eq!(dollars(f64::NAN), Decimal::ZERO);
        assert_eq!(dollars(f64::INFINITY), Decimal::ZERO);
    }

    #[test]
    fn trade_source_roundtrip() {
        assert_eq!(TradeSource::parse("api_sync"), Some(TradeSource::ApiSync));
        assert_eq!(TradeSource::parse("manual"), Some(TradeSource::Manual));
        assert_eq!(TradeSource::parse("other"), None);
    }
}
