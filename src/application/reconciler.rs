//! Trade reconciliation: venue fills and orders versus local trades.
//!
//! Auto-placed orders are tracked as trades with `order_<id>` venue
//! ids. When the venue later reports the executed fill, the order
//! trade is upgraded in place (id swap, true entry price, fees) so one
//! position never becomes two rows. Fills with no matching order trade
//! insert fresh `api_sync` trades. Cancelled resting orders transition
//! their trades to cancelled with zero P&L.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::trade::{dollars, NewTrade, TradeSource};
use crate::error::Result;
use crate::port::outbound::exchange::{Exchange, Fill};
use crate::port::outbound::store::{
    MarketStore, RecommendationStore, Store, SyncCounts, SyncLogStore, TradeStore,
};

/// Fills fetched per sync pass.
const FILL_FETCH_LIMIT: usize = 500;

pub struct TradeReconciler {
    store: Arc<dyn Store + Send + Sync>,
    exchange: Arc<dyn Exchange>,
}

impl TradeReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn Store + Send + Sync>, exchange: Arc<dyn Exchange>) -> Self {
        Self { store, exchange }
    }

    /// Full sync pass: ingest fills, then detect cancelled orders.
    /// Every pass writes a trade_sync_log row.
    pub async fn sync_all(&self) -> Result<SyncCounts> {
        if !self.exchange.is_configured() {
            info!("trade sync skipped, venue not configured");
            return Ok(SyncCounts::default());
        }

        let log_id = self.store.begin_sync(self.exchange.venue()).await?;
        match self.sync_fills().await {
            Ok(counts) => {
                self.store
                    .finish_sync(&log_id, "completed", counts, None)
                    .await?;
                let cancelled = self.detect_cancelled_orders().await.unwrap_or_else(|e| {
                    warn!(error = %e, "cancelled-order detection failed");
                    0
                });
                info!(
                    found = counts.trades_found,
                    created = counts.trades_created,
                    updated = counts.trades_updated,
                    skipped = counts.trades_skipped,
                    cancelled_orders = cancelled,
                    "trade sync complete"
                );
                Ok(counts)
            }
            Err(e) => {
                self.store
                    .finish_sync(&log_id, "failed", SyncCounts::default(), Some(&e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }

    /// Map venue fills onto local trades, deduplicating on the stable
    /// `fill_<id>` key and upgrading matching order trades in place.
    pub async fn sync_fills(&self) -> Result<SyncCounts> {
        let venue = self.exchange.venue();
        let fills = self.exchange.fetch_fills(FILL_FETCH_LIMIT).await?;
        let existing = self.store.synced_venue_trade_ids(venue).await?;

        let mut counts = SyncCounts {
            trades_found: fills.len(),
            ..SyncCounts::default()
        };

        for fill in fills {
            if fill.fill_id.is_empty() {
                counts.trades_skipped += 1;
                continue;
            }
            let venue_trade_id = format!("fill_{}", fill.fill_id);
            if existing.contains(&venue_trade_id) {
                counts.trades_skipped += 1;
                continue;
            }

            let Some(market) = self
                .store
                .get_market_by_venue(venue, &fill.ticker)
                .await?
            else {
                debug!(ticker = %fill.ticker, "skipping fill for untracked market");
                counts.trades_skipped += 1;
                continue;
            };

            let entry_price = match fill.side {
                crate::domain::recommendation::Direction::Yes => fill.yes_price,
                crate::domain::recommendation::Direction::No => fill.no_price,
            };
            let amount = dollars(fill.count as f64 * entry_price);

            // Order↔fill dedup: if this fill executes one of our
            // resting orders, rewrite that trade instead of inserting.
            if let Some(order_trade) = self
                .store
                .find_open_order_trade(&market.id, fill.side, venue)
                .await?
            {
                self.store
                    .promote_order_to_fill(
                        &order_trade.id,
                        &venue_trade_id,
                        entry_price,
                        amount,
                        fill.count as f64,
                        fill.fee_cost,
                    )
                    .await?;
                counts.trades_updated += 1;
                debug!(
                    trade_id = %order_trade.id,
                    fill_id = %fill.fill_id,
                    "order trade promoted to fill"
                );
                continue;
            }

            self.insert_synced_trade(&market.id, &fill, entry_price, venue_trade_id)
                .await?;
            counts.trades_created += 1;
        }

        Ok(counts)
    }

    async fn insert_synced_trade(
        &self,
        market_id: &crate::domain::id::MarketId,
        fill: &Fill,
        entry_price: f64,
        venue_trade_id: String,
    ) -> Result<()> {
        // Link back to the newest recommendation so performance can
        // compare advised vs. actual.
        let recommendation = self.store.latest_recommendation(market_id).await?;
        self.store
            .insert_trade(NewTrade {
                market_id: market_id.clone(),
                recommendation_id: recommendation.map(|r| r.id),
                venue: self.exchange.venue(),
                direction: fill.side,
                entry_price,
                amount: dollars(fill.count as f64 * entry_price),
                shares: Some(fill.count as f64),
                fees_paid: fill.fee_cost,
                notes: Some(format!(
                    "[auto-synced] {} {}x {}",
                    fill.action, fill.count, fill.ticker
                )),
                source: TradeSource::ApiSync,
                venue_trade_id: Some(venue_trade_id),
            })
            .await?;
        Ok(())
    }

    /// Any open trade tracking an order the venue reports as canceled
    /// moves to cancelled with zero P&L.
    pub async fn detect_cancelled_orders(&self) -> Result<usize> {
        let venue = self.exchange.venue();
        let canceled = self.exchange.fetch_orders(Some("canceled")).await?;

        let mut cancelled = 0;
        for order in canceled {
            let venue_trade_id = format!("order_{}", order.order_id);
            if let Some(trade) = self
                .store
                .find_open_trade_by_venue_trade_id(venue, &venue_trade_id)
                .await?
            {
                self.store
                    .cancel_trade(&trade.id, "[order cancelled at venue]")
                    .await?;
                cancelled += 1;
                info!(
                    trade_id = %trade.id,
                    order_id = %order.order_id,
                    "trade cancelled after venue order cancel"
                );
            }
        }
        Ok(cancelled)
    }
}
