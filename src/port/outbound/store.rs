//! Typed persistence ports.
//!
//! The store owns every persisted row; all other components go through
//! these traits. One backend implements the whole family.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::estimate::{Estimate, EstimateOutput};
use crate::domain::id::{MarketId, RecommendationId, ScanId, TradeId};
use crate::domain::market::{Market, MarketStatus, NormalizedMarket, Snapshot, Venue};
use crate::domain::performance::PerformanceRecord;
use crate::domain::recommendation::{NewRecommendation, Recommendation};
use crate::domain::trade::{NewTrade, Trade, TradeStatus};
use crate::error::Result;

/// Market and snapshot persistence.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Insert or update a market keyed by (venue, venue_id). Derives
    /// the outcome label from the description when absent.
    async fn upsert_market(&self, market: &NormalizedMarket) -> Result<Market>;

    async fn get_market(&self, id: &MarketId) -> Result<Option<Market>>;

    async fn get_market_by_venue(
        &self,
        venue: Venue,
        venue_id: &str,
    ) -> Result<Option<Market>>;

    async fn list_markets(
        &self,
        venue: Option<Venue>,
        status: Option<MarketStatus>,
        limit: usize,
    ) -> Result<Vec<Market>>;

    async fn update_market_status(
        &self,
        id: &MarketId,
        status: MarketStatus,
        outcome: Option<bool>,
    ) -> Result<()>;

    /// Append a price observation.
    async fn insert_snapshot(
        &self,
        market_id: &MarketId,
        price_yes: f64,
        price_no: Option<f64>,
        volume: Option<f64>,
        liquidity: Option<f64>,
    ) -> Result<Snapshot>;

    async fn latest_snapshot(&self, market_id: &MarketId) -> Result<Option<Snapshot>>;

    /// Active markets whose last two snapshots differ by at least
    /// `threshold`, as (market, older, newer).
    async fn markets_with_price_movement(
        &self,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<(Market, Snapshot, Snapshot)>>;
}

/// Estimate and cost-log persistence.
#[async_trait]
pub trait ResearchStore: Send + Sync {
    async fn insert_estimate(
        &self,
        market_id: &MarketId,
        output: &EstimateOutput,
        model_used: &str,
    ) -> Result<Estimate>;

    async fn latest_estimate(&self, market_id: &MarketId) -> Result<Option<Estimate>>;

    async fn insert_cost_log(
        &self,
        model_used: &str,
        input_tokens: u64,
        output_tokens: u64,
        estimated_cost: f64,
        scan_id: Option<&ScanId>,
        market_id: Option<&MarketId>,
    ) -> Result<()>;

    /// Rolling API-spend summary over the cost log.
    async fn cost_summary(&self) -> Result<CostSummary>;
}

/// Aggregated API spend.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostSummary {
    pub total_cost_today: f64,
    pub total_cost_week: f64,
    pub total_cost_month: f64,
    pub total_cost_all_time: f64,
    pub cost_per_scan_avg: f64,
    pub total_api_calls: usize,
}

/// Recommendation persistence.
#[async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Expire the prior active recommendation for the market and
    /// insert the new one, atomically, so at most one active
    /// recommendation per market can ever be observed.
    async fn replace_active_recommendation(
        &self,
        rec: NewRecommendation,
    ) -> Result<Recommendation>;

    async fn active_recommendations(&self) -> Result<Vec<Recommendation>>;

    /// Active recommendations whose market has no trade rows at all.
    async fn untraded_active_recommendations(&self) -> Result<Vec<Recommendation>>;

    /// Most recent recommendation for a market, any status.
    async fn latest_recommendation(
        &self,
        market_id: &MarketId,
    ) -> Result<Option<Recommendation>>;

    async fn expire_recommendations(&self, market_id: &MarketId) -> Result<usize>;

    async fn resolve_recommendations(&self, market_id: &MarketId) -> Result<usize>;

    /// Expire active recommendations for markets whose close time has
    /// passed.
    async fn expire_stale_recommendations(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Trade persistence.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn insert_trade(&self, trade: NewTrade) -> Result<Trade>;

    async fn open_trades(&self) -> Result<Vec<Trade>>;

    async fn trades_for_market(
        &self,
        market_id: &MarketId,
        status: Option<TradeStatus>,
    ) -> Result<Vec<Trade>>;

    async fn closed_trades(&self, limit: usize) -> Result<Vec<Trade>>;

    /// Venue trade ids of already-synced trades for dedup.
    async fn synced_venue_trade_ids(&self, venue: Venue) -> Result<HashSet<String>>;

    /// The newest open trade for (market, direction, venue) whose
    /// venue id marks it as a resting order (`order_` prefix).
    async fn find_open_order_trade(
        &self,
        market_id: &MarketId,
        direction: crate::domain::recommendation::Direction,
        venue: Venue,
    ) -> Result<Option<Trade>>;

    async fn find_open_trade_by_venue_trade_id(
        &self,
        venue: Venue,
        venue_trade_id: &str,
    ) -> Result<Option<Trade>>;

    /// Rewrite an order-tracking trade with the truth from its fill.
    async fn promote_order_to_fill(
        &self,
        trade_id: &TradeId,
        venue_trade_id: &str,
        entry_price: f64,
        amount: Decimal,
        shares: f64,
        fees_paid: Decimal,
    ) -> Result<()>;

    /// Transition one open trade to cancelled with pnl = 0.
    async fn cancel_trade(&self, trade_id: &TradeId, note: &str) -> Result<()>;

    /// Close all open trades for a resolved market, computing P&L at
    /// the given exit price (1.0 for YES, 0.0 for NO).
    async fn close_trades_for_market(
        &self,
        market_id: &MarketId,
        exit_price: f64,
    ) -> Result<Vec<Trade>>;

    /// Cancel all open trades for a voided market (no P&L).
    async fn cancel_trades_for_market(&self, market_id: &MarketId) -> Result<Vec<Trade>>;

    /// Sum of open trade amounts (deployed capital).
    async fn total_open_exposure(&self) -> Result<Decimal>;

    /// Sum of open trade amounts across markets of one venue event
    /// (venue ids sharing `event_prefix`).
    async fn event_exposure(&self, venue: Venue, event_prefix: &str) -> Result<Decimal>;
}

/// Outcome of an idempotent performance insert.
#[derive(Debug, Clone)]
pub enum PerformanceInsert {
    Inserted(PerformanceRecord),
    /// A row already existed for the market; treated as success.
    AlreadyRecorded,
}

/// Fields of a new performance row.
#[derive(Debug, Clone)]
pub struct NewPerformance {
    pub market_id: MarketId,
    pub recommendation_id: Option<RecommendationId>,
    pub ai_probability: f64,
    pub market_price: f64,
    pub actual_outcome: bool,
    pub pnl: Option<Decimal>,
    pub simulated_pnl: Option<Decimal>,
    pub brier_score: f64,
}

/// Performance-log persistence.
#[async_trait]
pub trait PerformanceStore: Send + Sync {
    /// Insert a performance row unless one already exists for the
    /// market (idempotent; per market at most one row ever).
    async fn insert_performance(&self, record: NewPerformance) -> Result<PerformanceInsert>;

    /// All performance rows, optionally filtered by market category.
    async fn performance_records(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<PerformanceRecord>>;
}

/// Key-value config persistence.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn config_overrides(&self) -> Result<HashMap<String, serde_json::Value>>;

    async fn write_config(&self, entries: &[(String, serde_json::Value)]) -> Result<()>;
}

/// Counters reported by one trade-sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub trades_found: usize,
    pub trades_created: usize,
    pub trades_updated: usize,
    pub trades_skipped: usize,
}

/// Trade-sync audit log.
#[async_trait]
pub trait SyncLogStore: Send + Sync {
    /// Open a running sync-log row; returns its id.
    async fn begin_sync(&self, venue: Venue) -> Result<String>;

    async fn finish_sync(
        &self,
        id: &str,
        status: &str,
        counts: SyncCounts,
        error_message: Option<&str>,
    ) -> Result<()>;
}

/// The full persistence surface. Implemented by the SQLite backend;
/// consumers hold `Arc<dyn Store>`.
pub trait Store:
    MarketStore
    + ResearchStore
    + RecommendationStore
    + TradeStore
    + PerformanceStore
    + ConfigStore
    + SyncLogStore
{
}

impl<T> Store for T where
    T: MarketStore
        + ResearchStore
        + RecommendationStore
        + TradeStore
        + PerformanceStore
        + ConfigStore
        + SyncLogStore
{
}
