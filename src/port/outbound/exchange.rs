//! Exchange integration port.
//!
//! Defines the contract a prediction-market venue adapter must satisfy:
//! market discovery, resolution checks, portfolio reads, and limit-buy
//! order placement.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::market::{NormalizedMarket, Venue};
use crate::domain::recommendation::Direction;
use crate::error::Result;

/// Parameters for a market listing request.
#[derive(Debug, Clone, Default)]
pub struct MarketQuery {
    /// Maximum total markets to return.
    pub limit: usize,
    /// Minimum volume; waived for sports/economics categories.
    pub min_volume: f64,
    /// Category labels to include (lowercase), `None` for all.
    pub categories: Option<HashSet<String>>,
    /// Earliest acceptable close time (unix seconds), pushed down.
    pub min_close_ts: Option<i64>,
    /// Latest acceptable close time (unix seconds), pushed down.
    pub max_close_ts: Option<i64>,
}

/// Resolution state of a venue market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    pub resolved: bool,
    pub outcome: Option<bool>,
    /// Finalized with an indeterminate result (voided).
    pub cancelled: bool,
}

/// An executed fill reported by the venue.
#[derive(Debug, Clone)]
pub struct Fill {
    pub fill_id: String,
    pub ticker: String,
    pub side: Direction,
    /// Venue action verb ("buy"/"sell"), carried for annotations.
    pub action: String,
    pub count: i64,
    /// YES price of the fill in (0, 1).
    pub yes_price: f64,
    /// NO price of the fill in (0, 1).
    pub no_price: f64,
    pub fee_cost: Decimal,
    pub created_at: Option<DateTime<Utc>>,
}

/// An open position reported by the venue.
#[derive(Debug, Clone)]
pub struct VenuePosition {
    pub ticker: String,
    /// Signed contract exposure: positive YES, negative NO.
    pub market_exposure: i64,
    pub resting_orders_count: i64,
}

/// A resting or historical order reported by the venue.
#[derive(Debug, Clone)]
pub struct VenueOrder {
    pub order_id: String,
    pub ticker: String,
    pub side: Direction,
    pub status: String,
    /// YES price in cents.
    pub yes_price: i64,
    pub count: i64,
    pub remaining_count: i64,
}

/// Account balance in dollars.
#[derive(Debug, Clone, Copy)]
pub struct Balance {
    pub cash: Decimal,
    pub portfolio_value: Decimal,
}

/// A limit-buy order to submit.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub ticker: String,
    pub side: Direction,
    pub count: i64,
    /// YES price in cents, 1..=99.
    pub yes_price_cents: i64,
}

/// Acknowledgement returned by the venue for a placed order.
#[derive(Debug, Clone)]
pub struct OrderAck {
    pub order_id: String,
    pub status: String,
}

/// A prediction-market venue client.
#[async_trait]
pub trait Exchange: Send + Sync {
    fn venue(&self) -> Venue;

    /// Whether credentials for this venue are configured at all.
    fn is_configured(&self) -> bool;

    /// Whether this venue supports order placement (trade-capable auth).
    fn supports_trading(&self) -> bool;

    /// Fetch active markets matching the query, normalized.
    async fn fetch_markets(&self, query: &MarketQuery) -> Result<Vec<NormalizedMarket>>;

    /// Check resolution state of one market. `None` means the check
    /// failed transiently and should be retried on a later pass.
    async fn check_resolution(&self, venue_id: &str) -> Option<Resolution>;

    /// Check many markets; ids whose check failed are absent from the
    /// result map.
    async fn check_resolutions_batch(&self, venue_ids: &[String])
        -> HashMap<String, Resolution>;

    async fn fetch_fills(&self, limit: usize) -> Result<Vec<Fill>>;

    async fn fetch_positions(&self) -> Result<Vec<VenuePosition>>;

    /// Fetch orders, optionally filtered by venue status string
    /// (e.g. "resting", "canceled").
    async fn fetch_orders(&self, status: Option<&str>) -> Result<Vec<VenueOrder>>;

    async fn fetch_balance(&self) -> Result<Balance>;

    /// Place a limit buy. The venue prices both sides via the YES
    /// price in cents.
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck>;
}
