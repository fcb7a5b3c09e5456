//! Database row types for Diesel ORM.
//!
//! Timestamps are stored as RFC 3339 text; money columns as doubles,
//! converted to `Decimal` at the row boundary.

use diesel::prelude::*;

use super::schema::{
    ai_estimates, config, cost_log, market_snapshots, markets, performance_log,
    recommendations, trade_sync_log, trades,
};

/// Database row for a market.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = markets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarketRow {
    pub id: String,
    pub venue: String,
    pub venue_id: String,
    pub question: String,
    pub description: Option<String>,
    pub resolution_criteria: Option<String>,
    pub category: Option<String>,
    pub close_at: Option<String>,
    pub outcome_label: Option<String>,
    pub status: String,
    pub outcome: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

/// Database row for a price snapshot.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = market_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SnapshotRow {
    pub id: String,
    pub market_id: String,
    pub price_yes: f64,
    pub price_no: Option<f64>,
    pub volume: Option<f64>,
    pub liquidity: Option<f64>,
    pub captured_at: String,
}

/// Database row for an AI estimate.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = ai_estimates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EstimateRow {
    pub id: String,
    pub market_id: String,
    pub probability: f64,
    pub confidence: String,
    pub reasoning: String,
    pub key_evidence: String,
    pub key_uncertainties: String,
    pub model_used: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub estimated_cost: f64,
    pub created_at: String,
}

/// Database row for a recommendation.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = recommendations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecommendationRow {
    pub id: String,
    pub market_id: String,
    pub estimate_id: String,
    pub snapshot_id: String,
    pub direction: String,
    pub market_price: f64,
    pub ai_probability: f64,
    pub edge: f64,
    pub ev: f64,
    pub kelly_fraction: f64,
    pub status: String,
    pub created_at: String,
}

/// Database row for a trade.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = trades)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TradeRow {
    pub id: String,
    pub market_id: String,
    pub recommendation_id: Option<String>,
    pub venue: String,
    pub direction: String,
    pub entry_price: f64,
    pub amount: f64,
    pub shares: Option<f64>,
    pub fees_paid: f64,
    pub status: String,
    pub exit_price: Option<f64>,
    pub pnl: Option<f64>,
    pub notes: Option<String>,
    pub source: String,
    pub venue_trade_id: Option<String>,
    pub created_at: String,
    pub closed_at: Option<String>,
}

/// Database row for a performance-log entry.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = performance_log)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PerformanceRow {
    pub id: String,
    pub market_id: String,
    pub recommendation_id: Option<String>,
    pub ai_probability: f64,
    pub market_price: f64,
    pub actual_outcome: i32,
    pub pnl: Option<f64>,
    pub simulated_pnl: Option<f64>,
    pub brier_score: f64,
    pub resolved_at: String,
}

/// Database row for a cost-log entry.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = cost_log)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CostLogRow {
    pub id: String,
    pub scan_id: Option<String>,
    pub market_id: Option<String>,
    pub model_used: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub estimated_cost: f64,
    pub created_at: String,
}

/// Database row for a config key-value entry.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = config)]
pub struct ConfigRow {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

/// Database row for a trade-sync audit entry.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = trade_sync_log)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TradeSyncLogRow {
    pub id: String,
    pub venue: String,
    pub status: String,
    pub trades_found: i32,
    pub trades_created: i32,
    pub trades_updated: i32,
    pub trades_skipped: i32,
    pub error_message: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}
