//! Market and snapshot domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{MarketId, SnapshotId};

/// Prediction-market venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Kalshi,
}

impl Venue {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kalshi => "kalshi",
        }
    }

    /// Parse a venue name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kalshi" => Some(Self::Kalshi),
            _ => None,
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a market.
///
/// `Active` markets are scanned and traded. `Resolved` is terminal with
/// an outcome set; `Closed` is terminal for cancelled/voided markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Active,
    Closed,
    Resolved,
}

impl MarketStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Resolved => "resolved",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// A market as observed at the exchange, normalized to the internal
/// schema. Produced by the exchange adapter, consumed by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedMarket {
    pub venue: Venue,
    /// Venue-native identifier (ticker).
    pub venue_id: String,
    pub question: String,
    pub description: Option<String>,
    pub resolution_criteria: Option<String>,
    /// Detected category ("NBA", "GDP", raw venue category, ...).
    pub category: Option<String>,
    /// Sport subtype when the category detector classified a sport.
    pub sport: Option<String>,
    /// Economic indicator label when classified as economics.
    pub economic_indicator: Option<String>,
    pub close_at: Option<DateTime<Utc>>,
    /// Human label of the YES outcome, when the venue provides one.
    pub outcome_label: Option<String>,
    /// Current YES price in (0, 1); `0.0` means the venue reported no
    /// usable price and the market is skipped downstream.
    pub price_yes: f64,
    pub volume: f64,
    pub liquidity: f64,
    /// First dash-segmented prefix grouping of the venue id (event).
    pub event_ticker: Option<String>,
}

impl NormalizedMarket {
    /// True when the venue reported a tradable YES price.
    #[must_use]
    pub fn has_price(&self) -> bool {
        self.price_yes > 0.0 && self.price_yes < 1.0
    }
}

/// A market row as persisted.
#[derive(Debug, Clone)]
pub struct Market {
    pub id: MarketId,
    pub venue: Venue,
    pub venue_id: String,
    pub question: String,
    pub description: Option<String>,
    pub resolution_criteria: Option<String>,
    pub category: Option<String>,
    pub close_at: Option<DateTime<Utc>>,
    pub outcome_label: Option<String>,
    pub status: MarketStatus,
    pub outcome: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only price observation for a market.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub market_id: MarketId,
    pub price_yes: f64,
    pub price_no: Option<f64>,
    pub volume: Option<f64>,
    pub liquidity: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

/// Event prefix of a venue ticker: everything before the last dash
/// segment. `KXNBAGSW-26FEB14-MIL` becomes `KXNBAGSW-26FEB14`. Used to
/// group sibling markets of one event for exposure limits.
#[must_use]
pub fn event_prefix(venue_id: &str) -> &str {
    match venue_id.rfind('-') {
        Some(idx) => &venue_id[..idx],
        None => venue_id,
    }
}

/// Derive the YES outcome label from a market description of the form
/// `If X wins the ...`, as some venues encode team markets.
#[must_use]
pub fn outcome_label_from_description(description: &str) -> Option<String> {
    let rest = description.strip_prefix("If ")?;
    let end = rest.find(" wins the ")?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_parse_is_case_insensitive() {
        assert_eq!(Venue::parse("Kalshi"), Some(Venue::Kalshi));
        assert_eq!(Venue::parse("KALSHI"), Some(Venue::Kalshi));
        assert_eq!(Venue::parse("unknown"), None);
    }

    #[test]
    fn status_roundtrip() {
        for status in [
            MarketStatus::Active,
            MarketStatus::Closed,
            MarketStatus::Resolved,
        ] {
            assert_eq!(MarketStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn event_prefix_strips_last_segment() {
        assert_eq!(event_prefix("KXNBAGSW-26FEB14-MIL"), "KXNBAGSW-26FEB14");
        assert_eq!(event_prefix("NODASH"), "NODASH");
    }

    #[test]
    fn outcome_label_extracted_from_description() {
        let label =
            outcome_label_from_description("If Milwaukee wins the game against Detroit");
        assert_eq!(label.as_deref(), Some("Milwaukee"));
    }

    #[test]
    fn outcome_label_absent_for_other_shapes() {
        assert!(outcome_label_from_description("Will CPI exceed 3%?").is_none());
        assert!(outcome_label_from_description("If it rains tomorrow").is_none());
    }

    #[test]
    fn has_price_rejects_degenerate_values() {
        let mut market = NormalizedMarket {
            venue: Venue::Kalshi,
            venue_id: "T".to_string(),
            question: "Q".to_string(),
            description: None,
            resolution_criteria: None,
            category: None,
            sport: None,
            economic_indicator: None,
            close_at: None,
            outcome_label: None,
            price_yes: 0.0,
            volume: 0.0,
            liquidity: 0.0,
            event_ticker: None,
        };
        assert!(!market.has_price());
        market.price_yes = 1.0;
        assert!(!market.has_price());
        market.price_yes = 0.42;
        assert!(market.has_price());
    }
}
