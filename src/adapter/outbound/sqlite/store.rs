//! SQLite store implementation.
//!
//! Implements every persistence port over one Diesel connection pool.
//! Row types live in [`super::database::model`]; conversion to domain
//! types happens here.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::application::calculator;
use crate::domain::estimate::{Confidence, Estimate, EstimateOutput};
use crate::domain::id::{EstimateId, MarketId, RecommendationId, ScanId, SnapshotId, TradeId};
use crate::domain::market::{
    outcome_label_from_description, Market, MarketStatus, NormalizedMarket, Snapshot, Venue,
};
use crate::domain::performance::PerformanceRecord;
use crate::domain::recommendation::{
    Direction, NewRecommendation, Recommendation, RecommendationStatus,
};
use crate::domain::trade::{dollars, NewTrade, Trade, TradeSource, TradeStatus};
use crate::error::{Error, Result};
use crate::port::outbound::store::{
    ConfigStore, CostSummary, MarketStore, NewPerformance, PerformanceInsert,
    PerformanceStore, RecommendationStore, ResearchStore, SyncCounts, SyncLogStore,
    TradeStore,
};

use super::database::connection::DbPool;
use super::database::model::{
    ConfigRow, CostLogRow, EstimateRow, MarketRow, PerformanceRow, RecommendationRow,
    SnapshotRow, TradeRow, TradeSyncLogRow,
};
use super::database::schema::{
    ai_estimates, config, cost_log, market_snapshots, markets, performance_log,
    recommendations, trade_sync_log, trades,
};

/// SQLite-backed store.
pub struct SqliteStore {
    pool: DbPool,
}

type Conn = PooledConnection<ConnectionManager<SqliteConnection>>;

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("bad timestamp {raw:?}: {e}")))
}

fn parse_ts_opt(raw: &Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

fn db_err(e: diesel::result::Error) -> Error {
    Error::Database(e.to_string())
}

impl SqliteStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<Conn> {
        self.pool.get().map_err(|e| Error::Connection(e.to_string()))
    }

    fn market_from_row(row: MarketRow) -> Result<Market> {
        let venue = Venue::parse(&row.venue)
            .ok_or_else(|| Error::Parse(format!("unknown venue {:?}", row.venue)))?;
        let status = MarketStatus::parse(&row.status)
            .ok_or_else(|| Error::Parse(format!("unknown market status {:?}", row.status)))?;
        Ok(Market {
            id: MarketId::from(row.id),
            venue,
            venue_id: row.venue_id,
            question: row.question,
            description: row.description,
            resolution_criteria: row.resolution_criteria,
            category: row.category,
            close_at: parse_ts_opt(&row.close_at)?,
            outcome_label: row.outcome_label,
            status,
            outcome: row.outcome.map(|v| v != 0),
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }

    fn snapshot_from_row(row: SnapshotRow) -> Result<Snapshot> {
        Ok(Snapshot {
            id: SnapshotId::from(row.id),
            market_id: MarketId::from(row.market_id),
            price_yes: row.price_yes,
            price_no: row.price_no,
            volume: row.volume,
            liquidity: row.liquidity,
            captured_at: parse_ts(&row.captured_at)?,
        })
    }

    fn estimate_from_row(row: EstimateRow) -> Result<Estimate> {
        let confidence = Confidence::parse(&row.confidence)
            .ok_or_else(|| Error::Parse(format!("unknown confidence {:?}", row.confidence)))?;
        Ok(Estimate {
            id: EstimateId::from(row.id),
            market_id: MarketId::from(row.market_id),
            probability: row.probability,
            confidence,
            reasoning: row.reasoning,
            key_evidence: serde_json::from_str(&row.key_evidence).unwrap_or_default(),
            key_uncertainties: serde_json::from_str(&row.key_uncertainties)
                .unwrap_or_default(),
            model_used: row.model_used,
            input_tokens: row.input_tokens.max(0) as u64,
            output_tokens: row.output_tokens.max(0) as u64,
            estimated_cost: row.estimated_cost,
            created_at: parse_ts(&row.created_at)?,
        })
    }

    fn recommendation_from_row(row: RecommendationRow) -> Result<Recommendation> {
        let direction = Direction::parse(&row.direction)
            .ok_or_else(|| Error::Parse(format!("unknown direction {:?}", row.direction)))?;
        let status = RecommendationStatus::parse(&row.status).ok_or_else(|| {
            Error::Parse(format!("unknown recommendation status {:?}", row.status))
        })?;
        Ok(Recommendation {
            id: RecommendationId::from(row.id),
            market_id: MarketId::from(row.market_id),
            estimate_id: EstimateId::from(row.estimate_id),
            snapshot_id: SnapshotId::from(row.snapshot_id),
            direction,
            market_price: row.market_price,
            ai_probability: row.ai_probability,
            edge: row.edge,
            ev: row.ev,
            kelly_fraction: row.kelly_fraction,
            status,
            created_at: parse_ts(&row.created_at)?,
        })
    }

    fn trade_from_row(row: TradeRow) -> Result<Trade> {
        let venue = Venue::parse(&row.venue)
            .ok_or_else(|| Error::Parse(format!("unknown venue {:?}", row.venue)))?;
        let direction = Direction::parse(&row.direction)
            .ok_or_else(|| Error::Parse(format!("unknown direction {:?}", row.direction)))?;
        let status = TradeStatus::parse(&row.status)
            .ok_or_else(|| Error::Parse(format!("unknown trade status {:?}", row.status)))?;
        let source = TradeSource::parse(&row.source)
            .ok_or_else(|| Error::Parse(format!("unknown trade source {:?}", row.source)))?;
        Ok(Trade {
            id: TradeId::from(row.id),
            market_id: MarketId::from(row.market_id),
            recommendation_id: row.recommendation_id.map(RecommendationId::from),
            venue,
            direction,
            entry_price: row.entry_price,
            amount: dollars(row.amount),
            shares: row.shares,
            fees_paid: dollars(row.fees_paid),
            status,
            exit_price: row.exit_price,
            pnl: row.pnl.map(dollars),
            notes: row.notes,
            source,
            venue_trade_id: row.venue_trade_id,
            created_at: parse_ts(&row.created_at)?,
            closed_at: parse_ts_opt(&row.closed_at)?,
        })
    }

    fn performance_from_row(row: PerformanceRow) -> Result<PerformanceRecord> {
        Ok(PerformanceRecord {
            id: row.id,
            market_id: MarketId::from(row.market_id),
            recommendation_id: row.recommendation_id.map(RecommendationId::from),
            ai_probability: row.ai_probability,
            market_price: row.market_price,
            actual_outcome: row.actual_outcome != 0,
            pnl: row.pnl.map(dollars),
            simulated_pnl: row.simulated_pnl.map(dollars),
            brier_score: row.brier_score,
            resolved_at: parse_ts(&row.resolved_at)?,
        })
    }

    fn last_two_snapshots(conn: &mut Conn, market_id: &str) -> Result<Vec<SnapshotRow>> {
        market_snapshots::table
            .filter(market_snapshots::market_id.eq(market_id))
            .order(market_snapshots::captured_at.desc())
            .limit(2)
            .load(conn)
            .map_err(db_err)
    }
}

#[async_trait]
impl MarketStore for SqliteStore {
    async fn upsert_market(&self, market: &NormalizedMarket) -> Result<Market> {
        let outcome_label = market.outcome_label.clone().or_else(|| {
            market
                .description
                .as_deref()
                .and_then(outcome_label_from_description)
        });

        let now = now_rfc3339();
        let row = MarketRow {
            id: MarketId::new().to_string(),
            venue: market.venue.as_str().to_string(),
            venue_id: market.venue_id.clone(),
            question: market.question.clone(),
            description: market.description.clone(),
            resolution_criteria: market.resolution_criteria.clone(),
            category: market.category.clone(),
            close_at: market.close_at.map(|dt| dt.to_rfc3339()),
            outcome_label,
            status: MarketStatus::Active.as_str().to_string(),
            outcome: None,
            created_at: now.clone(),
            updated_at: now,
        };

        let mut conn = self.conn()?;
        diesel::insert_into(markets::table)
            .values(&row)
            .on_conflict((markets::venue, markets::venue_id))
            .do_update()
            .set((
                markets::question.eq(&row.question),
                markets::description.eq(row.description.as_deref()),
                markets::resolution_criteria.eq(row.resolution_criteria.as_deref()),
                markets::category.eq(row.category.as_deref()),
                markets::close_at.eq(row.close_at.as_deref()),
                markets::outcome_label.eq(row.outcome_label.as_deref()),
                markets::updated_at.eq(&row.updated_at),
            ))
            .execute(&mut conn)
            .map_err(db_err)?;

        let stored: MarketRow = markets::table
            .filter(markets::venue.eq(market.venue.as_str()))
            .filter(markets::venue_id.eq(&market.venue_id))
            .first(&mut conn)
            .map_err(db_err)?;
        Self::market_from_row(stored)
    }

    async fn get_market(&self, id: &MarketId) -> Result<Option<Market>> {
        let mut conn = self.conn()?;
        let row: Option<MarketRow> = markets::table
            .find(id.as_str())
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;
        row.map(Self::market_from_row).transpose()
    }

    async fn get_market_by_venue(
        &self,
        venue: Venue,
        venue_id: &str,
    ) -> Result<Option<Market>> {
        let mut conn = self.conn()?;
        let row: Option<MarketRow> = markets::table
            .filter(markets::venue.eq(venue.as_str()))
            .filter(markets::venue_id.eq(venue_id))
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;
        row.map(Self::market_from_row).transpose()
    }

    async fn list_markets(
        &self,
        venue: Option<Venue>,
        status: Option<MarketStatus>,
        limit: usize,
    ) -> Result<Vec<Market>> {
        let mut conn = self.conn()?;
        let mut query = markets::table.into_boxed();
        if let Some(venue) = venue {
            query = query.filter(markets::venue.eq(venue.as_str()));
        }
        if let Some(status) = status {
            query = query.filter(markets::status.eq(status.as_str()));
        }
        let rows: Vec<MarketRow> = query
            .order(markets::updated_at.desc())
            .limit(limit as i64)
            .load(&mut conn)
            .map_err(db_err)?;
        rows.into_iter().map(Self::market_from_row).collect()
    }

    async fn update_market_status(
        &self,
        id: &MarketId,
        status: MarketStatus,
        outcome: Option<bool>,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let now = now_rfc3339();
        match outcome {
            Some(outcome) => diesel::update(markets::table.find(id.as_str()))
                .set((
                    markets::status.eq(status.as_str()),
                    markets::outcome.eq(Some(i32::from(outcome))),
                    markets::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .map_err(db_err)?,
            None => diesel::update(markets::table.find(id.as_str()))
                .set((
                    markets::status.eq(status.as_str()),
                    markets::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .map_err(db_err)?,
        };
        Ok(())
    }

    async fn insert_snapshot(
        &self,
        market_id: &MarketId,
        price_yes: f64,
        price_no: Option<f64>,
        volume: Option<f64>,
        liquidity: Option<f64>,
    ) -> Result<Snapshot> {
        let row = SnapshotRow {
            id: SnapshotId::new().to_string(),
            market_id: market_id.to_string(),
            price_yes,
            price_no: Some(
                price_no.unwrap_or_else(|| ((1.0 - price_yes) * 10_000.0).round() / 10_000.0),
            ),
            volume,
            liquidity,
            captured_at: now_rfc3339(),
        };
        let mut conn = self.conn()?;
        diesel::insert_into(market_snapshots::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(db_err)?;
        Self::snapshot_from_row(row)
    }

    async fn latest_snapshot(&self, market_id: &MarketId) -> Result<Option<Snapshot>> {
        let mut conn = self.conn()?;
        let row: Option<SnapshotRow> = market_snapshots::table
            .filter(market_snapshots::market_id.eq(market_id.as_str()))
            .order(market_snapshots::captured_at.desc())
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;
        row.map(Self::snapshot_from_row).transpose()
    }

    async fn markets_with_price_movement(
        &self,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<(Market, Snapshot, Snapshot)>> {
        let active = self
            .list_markets(None, Some(MarketStatus::Active), limit)
            .await?;
        let mut conn = self.conn()?;
        let mut moved = Vec::new();
        for market in active {
            let rows = Self::last_two_snapshots(&mut conn, market.id.as_str())?;
            if rows.len() < 2 {
                continue;
            }
            let newer = Self::snapshot_from_row(rows[0].clone())?;
            let older = Self::snapshot_from_row(rows[1].clone())?;
            if (newer.price_yes - older.price_yes).abs() >= threshold {
                moved.push((market, older, newer));
            }
        }
        Ok(moved)
    }
}

#[async_trait]
impl ResearchStore for SqliteStore {
    async fn insert_estimate(
        &self,
        market_id: &MarketId,
        output: &EstimateOutput,
        model_used: &str,
    ) -> Result<Estimate> {
        let row = EstimateRow {
            id: EstimateId::new().to_string(),
            market_id: market_id.to_string(),
            probability: output.probability,
            confidence: output.confidence.as_str().to_string(),
            reasoning: output.reasoning.clone(),
            key_evidence: serde_json::to_string(&output.key_evidence)?,
            key_uncertainties: serde_json::to_string(&output.key_uncertainties)?,
            model_used: model_used.to_string(),
            input_tokens: output.input_tokens as i64,
            output_tokens: output.output_tokens as i64,
            estimated_cost: output.estimated_cost,
            created_at: now_rfc3339(),
        };
        let mut conn = self.conn()?;
        diesel::insert_into(ai_estimates::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(db_err)?;
        Self::estimate_from_row(row)
    }

    async fn latest_estimate(&self, market_id: &MarketId) -> Result<Option<Estimate>> {
        let mut conn = self.conn()?;
        let row: Option<EstimateRow> = ai_estimates::table
            .filter(ai_estimates::market_id.eq(market_id.as_str()))
            .order(ai_estimates::created_at.desc())
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;
        row.map(Self::estimate_from_row).transpose()
    }

    async fn insert_cost_log(
        &self,
        model_used: &str,
        input_tokens: u64,
        output_tokens: u64,
        estimated_cost: f64,
        scan_id: Option<&ScanId>,
        market_id: Option<&MarketId>,
    ) -> Result<()> {
        let row = CostLogRow {
            id: uuid::Uuid::new_v4().to_string(),
            scan_id: scan_id.map(ToString::to_string),
            market_id: market_id.map(ToString::to_string),
            model_used: model_used.to_string(),
            input_tokens: input_tokens as i64,
            output_tokens: output_tokens as i64,
            estimated_cost,
            created_at: now_rfc3339(),
        };
        let mut conn = self.conn()?;
        diesel::insert_into(cost_log::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(())
    }

    async fn cost_summary(&self) -> Result<CostSummary> {
        let mut conn = self.conn()?;
        let rows: Vec<CostLogRow> = cost_log::table
            .order(cost_log::created_at.desc())
            .limit(10_000)
            .load(&mut conn)
            .map_err(db_err)?;

        let now = Utc::now();
        let mut summary = CostSummary {
            total_api_calls: rows.len(),
            ..CostSummary::default()
        };
        let mut scan_ids: HashSet<String> = HashSet::new();

        for row in &rows {
            let cost = row.estimated_cost;
            summary.total_cost_all_time += cost;
            if let Ok(created) = parse_ts(&row.created_at) {
                let age_days = (now - created).num_days();
                if age_days < 1 {
                    summary.total_cost_today += cost;
                }
                if age_days < 7 {
                    summary.total_cost_week += cost;
                }
                if age_days < 30 {
                    summary.total_cost_month += cost;
                }
            }
            if let Some(scan_id) = &row.scan_id {
                scan_ids.insert(scan_id.clone());
            }
        }
        if !scan_ids.is_empty() {
            summary.cost_per_scan_avg = summary.total_cost_all_time / scan_ids.len() as f64;
        }
        Ok(summary)
    }
}

#[async_trait]
impl RecommendationStore for SqliteStore {
    async fn replace_active_recommendation(
        &self,
        rec: NewRecommendation,
    ) -> Result<Recommendation> {
        let row = RecommendationRow {
            id: RecommendationId::new().to_string(),
            market_id: rec.market_id.to_string(),
            estimate_id: rec.estimate_id.to_string(),
            snapshot_id: rec.snapshot_id.to_string(),
            direction: rec.direction.as_str().to_string(),
            market_price: rec.market_price,
            ai_probability: rec.ai_probability,
            edge: rec.edge,
            ev: rec.ev,
            kelly_fraction: rec.kelly_fraction,
            status: RecommendationStatus::Active.as_str().to_string(),
            created_at: now_rfc3339(),
        };

        let mut conn = self.conn()?;
        // One transaction so the single-active-per-market invariant
        // holds even if the process dies between the two writes.
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::update(
                recommendations::table
                    .filter(recommendations::market_id.eq(row.market_id.as_str()))
                    .filter(recommendations::status.eq("active")),
            )
            .set(recommendations::status.eq("expired"))
            .execute(conn)?;

            diesel::insert_into(recommendations::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .map_err(db_err)?;

        Self::recommendation_from_row(row)
    }

    async fn active_recommendations(&self) -> Result<Vec<Recommendation>> {
        let mut conn = self.conn()?;
        let rows: Vec<RecommendationRow> = recommendations::table
            .filter(recommendations::status.eq("active"))
            .order(recommendations::ev.desc())
            .load(&mut conn)
            .map_err(db_err)?;
        rows.into_iter().map(Self::recommendation_from_row).collect()
    }

    async fn untraded_active_recommendations(&self) -> Result<Vec<Recommendation>> {
        let mut conn = self.conn()?;
        let traded: Vec<Option<String>> = trades::table
            .select(trades::recommendation_id)
            .filter(trades::recommendation_id.is_not_null())
            .load(&mut conn)
            .map_err(db_err)?;
        let traded: HashSet<String> = traded.into_iter().flatten().collect();

        let rows: Vec<RecommendationRow> = recommendations::table
            .filter(recommendations::status.eq("active"))
            .order(recommendations::ev.desc())
            .load(&mut conn)
            .map_err(db_err)?;
        rows.into_iter()
            .filter(|row| !traded.contains(&row.id))
            .map(Self::recommendation_from_row)
            .collect()
    }

    async fn latest_recommendation(
        &self,
        market_id: &MarketId,
    ) -> Result<Option<Recommendation>> {
        let mut conn = self.conn()?;
        let row: Option<RecommendationRow> = recommendations::table
            .filter(recommendations::market_id.eq(market_id.as_str()))
            .order(recommendations::created_at.desc())
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;
        row.map(Self::recommendation_from_row).transpose()
    }

    async fn expire_recommendations(&self, market_id: &MarketId) -> Result<usize> {
        let mut conn = self.conn()?;
        diesel::update(
            recommendations::table
                .filter(recommendations::market_id.eq(market_id.as_str()))
                .filter(recommendations::status.eq("active")),
        )
        .set(recommendations::status.eq("expired"))
        .execute(&mut conn)
        .map_err(db_err)
    }

    async fn resolve_recommendations(&self, market_id: &MarketId) -> Result<usize> {
        let mut conn = self.conn()?;
        diesel::update(
            recommendations::table
                .filter(recommendations::market_id.eq(market_id.as_str()))
                .filter(recommendations::status.eq("active")),
        )
        .set(recommendations::status.eq("resolved"))
        .execute(&mut conn)
        .map_err(db_err)
    }

    async fn expire_stale_recommendations(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn()?;
        let now_iso = now.to_rfc3339();
        let stale_ids: Vec<String> = markets::table
            .select(markets::id)
            .filter(markets::close_at.lt(&now_iso))
            .load(&mut conn)
            .map_err(db_err)?;
        if stale_ids.is_empty() {
            return Ok(0);
        }
        let expired = diesel::update(
            recommendations::table
                .filter(recommendations::market_id.eq_any(&stale_ids))
                .filter(recommendations::status.eq("active")),
        )
        .set(recommendations::status.eq("expired"))
        .execute(&mut conn)
        .map_err(db_err)?;
        if expired > 0 {
            info!(expired, markets = stale_ids.len(), "expired stale recommendations");
        }
        Ok(expired)
    }
}

#[async_trait]
impl TradeStore for SqliteStore {
    async fn insert_trade(&self, trade: NewTrade) -> Result<Trade> {
        let row = TradeRow {
            id: TradeId::new().to_string(),
            market_id: trade.market_id.to_string(),
            recommendation_id: trade.recommendation_id.map(|id| id.to_string()),
            venue: trade.venue.as_str().to_string(),
            direction: trade.direction.as_str().to_string(),
            entry_price: trade.entry_price,
            amount: trade.amount.to_f64().unwrap_or(0.0),
            shares: trade.shares,
            fees_paid: trade.fees_paid.to_f64().unwrap_or(0.0),
            status: TradeStatus::Open.as_str().to_string(),
            exit_price: None,
            pnl: None,
            notes: trade.notes,
            source: trade.source.as_str().to_string(),
            venue_trade_id: trade.venue_trade_id,
            created_at: now_rfc3339(),
            closed_at: None,
        };
        let mut conn = self.conn()?;
        diesel::insert_into(trades::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(db_err)?;
        Self::trade_from_row(row)
    }

    async fn open_trades(&self) -> Result<Vec<Trade>> {
        let mut conn = self.conn()?;
        let rows: Vec<TradeRow> = trades::table
            .filter(trades::status.eq("open"))
            .order(trades::created_at.desc())
            .load(&mut conn)
            .map_err(db_err)?;
        rows.into_iter().map(Self::trade_from_row).collect()
    }

    async fn trades_for_market(
        &self,
        market_id: &MarketId,
        status: Option<TradeStatus>,
    ) -> Result<Vec<Trade>> {
        let mut conn = self.conn()?;
        let mut query = trades::table
            .filter(trades::market_id.eq(market_id.as_str()))
            .into_boxed();
        if let Some(status) = status {
            query = query.filter(trades::status.eq(status.as_str()));
        }
        let rows: Vec<TradeRow> = query
            .order(trades::created_at.desc())
            .load(&mut conn)
            .map_err(db_err)?;
        rows.into_iter().map(Self::trade_from_row).collect()
    }

    async fn closed_trades(&self, limit: usize) -> Result<Vec<Trade>> {
        let mut conn = self.conn()?;
        let rows: Vec<TradeRow> = trades::table
            .filter(trades::status.eq("closed"))
            .order(trades::closed_at.desc())
            .limit(limit as i64)
            .load(&mut conn)
            .map_err(db_err)?;
        rows.into_iter().map(Self::trade_from_row).collect()
    }

    async fn synced_venue_trade_ids(&self, venue: Venue) -> Result<HashSet<String>> {
        let mut conn = self.conn()?;
        let ids: Vec<Option<String>> = trades::table
            .select(trades::venue_trade_id)
            .filter(trades::venue.eq(venue.as_str()))
            .filter(trades::venue_trade_id.is_not_null())
            .load(&mut conn)
            .map_err(db_err)?;
        Ok(ids.into_iter().flatten().collect())
    }

    async fn find_open_order_trade(
        &self,
        market_id: &MarketId,
        direction: Direction,
        venue: Venue,
    ) -> Result<Option<Trade>> {
        let mut conn = self.conn()?;
        let row: Option<TradeRow> = trades::table
            .filter(trades::venue.eq(venue.as_str()))
            .filter(trades::market_id.eq(market_id.as_str()))
            .filter(trades::direction.eq(direction.as_str()))
            .filter(trades::status.eq("open"))
            .filter(trades::venue_trade_id.like("order_%"))
            .order(trades::created_at.desc())
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;
        row.map(Self::trade_from_row).transpose()
    }

    async fn find_open_trade_by_venue_trade_id(
        &self,
        venue: Venue,
        venue_trade_id: &str,
    ) -> Result<Option<Trade>> {
        let mut conn = self.conn()?;
        let row: Option<TradeRow> = trades::table
            .filter(trades::venue.eq(venue.as_str()))
            .filter(trades::venue_trade_id.eq(venue_trade_id))
            .filter(trades::status.eq("open"))
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;
        row.map(Self::trade_from_row).transpose()
    }

    async fn promote_order_to_fill(
        &self,
        trade_id: &TradeId,
        venue_trade_id: &str,
        entry_price: f64,
        amount: Decimal,
        shares: f64,
        fees_paid: Decimal,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        diesel::update(trades::table.find(trade_id.as_str()))
            .set((
                trades::venue_trade_id.eq(venue_trade_id),
                trades::entry_price.eq(entry_price),
                trades::amount.eq(amount.to_f64().unwrap_or(0.0)),
                trades::shares.eq(Some(shares)),
                trades::fees_paid.eq(fees_paid.to_f64().unwrap_or(0.0)),
            ))
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(())
    }

    async fn cancel_trade(&self, trade_id: &TradeId, note: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let existing_notes: Option<Option<String>> = trades::table
            .find(trade_id.as_str())
            .select(trades::notes)
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;
        let notes = match existing_notes.flatten() {
            Some(prior) if !prior.is_empty() => format!("{prior} {note}"),
            _ => note.to_string(),
        };
        diesel::update(trades::table.find(trade_id.as_str()))
            .set((
                trades::status.eq("cancelled"),
                trades::pnl.eq(Some(0.0)),
                trades::closed_at.eq(Some(now_rfc3339())),
                trades::notes.eq(Some(notes)),
            ))
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(())
    }

    async fn close_trades_for_market(
        &self,
        market_id: &MarketId,
        exit_price: f64,
    ) -> Result<Vec<Trade>> {
        let open = self
            .trades_for_market(market_id, Some(TradeStatus::Open))
            .await?;
        let mut conn = self.conn()?;
        let closed_at = now_rfc3339();
        let mut closed = Vec::with_capacity(open.len());

        for trade in open {
            let won = match trade.direction {
                Direction::Yes => exit_price >= 0.99,
                Direction::No => exit_price <= 0.01,
            };
            let pnl = calculator::position_pnl(
                trade.entry_price,
                trade.amount.to_f64().unwrap_or(0.0),
                won,
                trade.fees_paid.to_f64().unwrap_or(0.0),
            );
            diesel::update(trades::table.find(trade.id.as_str()))
                .set((
                    trades::status.eq("closed"),
                    trades::exit_price.eq(Some(exit_price)),
                    trades::pnl.eq(Some(pnl)),
                    trades::closed_at.eq(Some(closed_at.clone())),
                ))
                .execute(&mut conn)
                .map_err(db_err)?;

            closed.push(Trade {
                status: TradeStatus::Closed,
                exit_price: Some(exit_price),
                pnl: Some(dollars(pnl)),
                closed_at: parse_ts(&closed_at).ok(),
                ..trade
            });
        }
        Ok(closed)
    }

    async fn cancel_trades_for_market(&self, market_id: &MarketId) -> Result<Vec<Trade>> {
        let open = self
            .trades_for_market(market_id, Some(TradeStatus::Open))
            .await?;
        let mut cancelled = Vec::with_capacity(open.len());
        for trade in open {
            self.cancel_trade(&trade.id, "[market cancelled/voided]").await?;
            cancelled.push(Trade {
                status: TradeStatus::Cancelled,
                pnl: Some(Decimal::ZERO),
                ..trade
            });
        }
        Ok(cancelled)
    }

    async fn total_open_exposure(&self) -> Result<Decimal> {
        let mut conn = self.conn()?;
        let amounts: Vec<f64> = trades::table
            .select(trades::amount)
            .filter(trades::status.eq("open"))
            .load(&mut conn)
            .map_err(db_err)?;
        Ok(dollars(amounts.iter().sum()))
    }

    async fn event_exposure(&self, venue: Venue, event_prefix: &str) -> Result<Decimal> {
        let mut conn = self.conn()?;
        let pattern = format!("{event_prefix}%");
        let market_ids: Vec<String> = markets::table
            .select(markets::id)
            .filter(markets::venue.eq(venue.as_str()))
            .filter(markets::venue_id.like(&pattern))
            .load(&mut conn)
            .map_err(db_err)?;
        if market_ids.is_empty() {
            return Ok(Decimal::ZERO);
        }
        let amounts: Vec<f64> = trades::table
            .select(trades::amount)
            .filter(trades::market_id.eq_any(&market_ids))
            .filter(trades::status.eq("open"))
            .load(&mut conn)
            .map_err(db_err)?;
        Ok(dollars(amounts.iter().sum()))
    }
}

#[async_trait]
impl PerformanceStore for SqliteStore {
    async fn insert_performance(&self, record: NewPerformance) -> Result<PerformanceInsert> {
        let mut conn = self.conn()?;

        let existing: Option<String> = performance_log::table
            .select(performance_log::id)
            .filter(performance_log::market_id.eq(record.market_id.as_str()))
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;
        if existing.is_some() {
            warn!(
                market_id = %record.market_id,
                "performance row already exists, skipping"
            );
            return Ok(PerformanceInsert::AlreadyRecorded);
        }

        let row = PerformanceRow {
            id: uuid::Uuid::new_v4().to_string(),
            market_id: record.market_id.to_string(),
            recommendation_id: record.recommendation_id.map(|id| id.to_string()),
            ai_probability: record.ai_probability,
            market_price: record.market_price,
            actual_outcome: i32::from(record.actual_outcome),
            pnl: record.pnl.and_then(|v| v.to_f64()),
            simulated_pnl: record.simulated_pnl.and_then(|v| v.to_f64()),
            brier_score: record.brier_score,
            resolved_at: now_rfc3339(),
        };
        diesel::insert_into(performance_log::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(PerformanceInsert::Inserted(Self::performance_from_row(row)?))
    }

    async fn performance_records(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<PerformanceRecord>> {
        let mut conn = self.conn()?;
        let rows: Vec<PerformanceRow> = match category {
            Some(category) => {
                let market_ids: Vec<String> = markets::table
                    .select(markets::id)
                    .filter(markets::category.eq(category))
                    .load(&mut conn)
                    .map_err(db_err)?;
                performance_log::table
                    .filter(performance_log::market_id.eq_any(&market_ids))
                    .order(performance_log::resolved_at.asc())
                    .load(&mut conn)
                    .map_err(db_err)?
            }
            None => performance_log::table
                .order(performance_log::resolved_at.asc())
                .load(&mut conn)
                .map_err(db_err)?,
        };
        rows.into_iter().map(Self::performance_from_row).collect()
    }
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn config_overrides(&self) -> Result<HashMap<String, serde_json::Value>> {
        let mut conn = self.conn()?;
        let rows: Vec<ConfigRow> = config::table.load(&mut conn).map_err(db_err)?;
        let mut overrides = HashMap::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str(&row.value) {
                Ok(value) => {
                    overrides.insert(row.key, value);
                }
                Err(e) => {
                    warn!(key = %row.key, error = %e, "skipping unparseable config value");
                }
            }
        }
        Ok(overrides)
    }

    async fn write_config(&self, entries: &[(String, serde_json::Value)]) -> Result<()> {
        let mut conn = self.conn()?;
        let now = now_rfc3339();
        for (key, value) in entries {
            let row = ConfigRow {
                key: key.clone(),
                value: serde_json::to_string(value)?,
                updated_at: now.clone(),
            };
            diesel::replace_into(config::table)
                .values(&row)
                .execute(&mut conn)
                .map_err(db_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl SyncLogStore for SqliteStore {
    async fn begin_sync(&self, venue: Venue) -> Result<String> {
        let row = TradeSyncLogRow {
            id: uuid::Uuid::new_v4().to_string(),
            venue: venue.as_str().to_string(),
            status: "running".to_string(),
            trades_found: 0,
            trades_created: 0,
            trades_updated: 0,
            trades_skipped: 0,
            error_message: None,
            started_at: now_rfc3339(),
            completed_at: None,
        };
        let mut conn = self.conn()?;
        diesel::insert_into(trade_sync_log::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(row.id)
    }

    async fn finish_sync(
        &self,
        id: &str,
        status: &str,
        counts: SyncCounts,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        diesel::update(trade_sync_log::table.find(id))
            .set((
                trade_sync_log::status.eq(status),
                trade_sync_log::trades_found.eq(counts.trades_found as i32),
                trade_sync_log::trades_created.eq(counts.trades_created as i32),
                trade_sync_log::trades_updated.eq(counts.trades_updated as i32),
                trade_sync_log::trades_skipped.eq(counts.trades_skipped as i32),
                trade_sync_log::error_message.eq(error_message),
                trade_sync_log::completed_at.eq(Some(now_rfc3339())),
            ))
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(())
    }
}
