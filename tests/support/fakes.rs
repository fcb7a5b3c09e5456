//! Scripted doubles for the exchange, estimator, and notifier ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use augur::domain::estimate::{BlindMarketInput, Confidence, EstimateOutput};
use augur::domain::market::{NormalizedMarket, Venue};
use augur::domain::recommendation::Direction;
use augur::error::{Error, ResearchError, Result};
use augur::port::outbound::estimator::Estimator;
use augur::port::outbound::exchange::{
    Balance, Exchange, Fill, MarketQuery, OrderAck, OrderRequest, Resolution, VenueOrder,
    VenuePosition,
};
use augur::port::outbound::notifier::{
    ChannelResults, DigestReport, Notifier, RecommendationAlert, ResolutionAlert, ScanStats,
    TradeAlert,
};

/// A normalized market with sane defaults for tests: in-window close
/// date, plenty of volume, NBA category (volume waiver irrelevant).
pub fn market(ticker: &str, question: &str, price_yes: f64) -> NormalizedMarket {
    NormalizedMarket {
        venue: Venue::Kalshi,
        venue_id: ticker.to_string(),
        question: question.to_string(),
        description: None,
        resolution_criteria: Some(format!("Resolves YES if: {question}")),
        category: Some("NBA".to_string()),
        sport: Some("NBA".to_string()),
        economic_indicator: None,
        close_at: Some(Utc::now() + Duration::hours(6)),
        outcome_label: None,
        price_yes,
        volume: 125_000.0,
        liquidity: 40_000.0,
        event_ticker: ticker.rsplit_once('-').map(|(prefix, _)| prefix.to_string()),
    }
}

/// Exchange double returning preset markets and resolutions, and
/// recording placed orders.
#[derive(Default)]
pub struct ScriptedExchange {
    pub markets: Mutex<Vec<NormalizedMarket>>,
    pub resolutions: Mutex<HashMap<String, Resolution>>,
    pub fills: Mutex<Vec<Fill>>,
    pub orders: Mutex<Vec<VenueOrder>>,
    pub placed: Mutex<Vec<OrderRequest>>,
    pub trading: bool,
    order_seq: AtomicUsize,
}

impl ScriptedExchange {
    pub fn trading() -> Self {
        Self {
            trading: true,
            ..Self::default()
        }
    }

    pub fn with_markets(self, markets: Vec<NormalizedMarket>) -> Self {
        *self.markets.lock() = markets;
        self
    }

    pub fn resolve(&self, ticker: &str, outcome: bool) {
        self.resolutions.lock().insert(
            ticker.to_string(),
            Resolution {
                resolved: true,
                outcome: Some(outcome),
                cancelled: false,
            },
        );
    }

    pub fn void(&self, ticker: &str) {
        self.resolutions.lock().insert(
            ticker.to_string(),
            Resolution {
                resolved: false,
                outcome: None,
                cancelled: true,
            },
        );
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.placed.lock().clone()
    }
}

#[async_trait]
impl Exchange for ScriptedExchange {
    fn venue(&self) -> Venue {
        Venue::Kalshi
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn supports_trading(&self) -> bool {
        self.trading
    }

    async fn fetch_markets(&self, _query: &MarketQuery) -> Result<Vec<NormalizedMarket>> {
        Ok(self.markets.lock().clone())
    }

    async fn check_resolution(&self, venue_id: &str) -> Option<Resolution> {
        self.resolutions.lock().get(venue_id).copied()
    }

    async fn check_resolutions_batch(
        &self,
        venue_ids: &[String],
    ) -> HashMap<String, Resolution> {
        let resolutions = self.resolutions.lock();
        venue_ids
            .iter()
            .filter_map(|id| resolutions.get(id).map(|r| (id.clone(), *r)))
            .collect()
    }

    async fn fetch_fills(&self, _limit: usize) -> Result<Vec<Fill>> {
        Ok(self.fills.lock().clone())
    }

    async fn fetch_positions(&self) -> Result<Vec<VenuePosition>> {
        Ok(Vec::new())
    }

    async fn fetch_orders(&self, status: Option<&str>) -> Result<Vec<VenueOrder>> {
        let orders = self.orders.lock();
        Ok(orders
            .iter()
            .filter(|o| status.is_none() || status == Some(o.status.as_str()))
            .cloned()
            .collect())
    }

    async fn fetch_balance(&self) -> Result<Balance> {
        Ok(Balance {
            cash: Decimal::from(1000),
            portfolio_value: Decimal::ZERO,
        })
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        if !self.trading {
            return Err(Error::Execution("trading not supported".to_string()));
        }
        self.placed.lock().push(order.clone());
        let seq = self.order_seq.fetch_add(1, Ordering::SeqCst);
        Ok(OrderAck {
            order_id: format!("ord{seq}"),
            status: "resting".to_string(),
        })
    }
}

/// Estimator double keyed by question text.
#[derive(Default)]
pub struct ScriptedEstimator {
    pub outputs: Mutex<HashMap<String, EstimateOutput>>,
    pub batch_fails: bool,
    pub screen_rejects: Mutex<Vec<String>>,
    pub estimate_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

pub fn estimate(probability: f64, confidence: Confidence) -> EstimateOutput {
    EstimateOutput {
        probability,
        confidence,
        reasoning: "scripted".to_string(),
        key_evidence: vec!["evidence".to_string()],
        key_uncertainties: vec!["uncertainty".to_string()],
        input_tokens: 1_000,
        output_tokens: 500,
        estimated_cost: 0.0105,
    }
}

impl ScriptedEstimator {
    pub fn with_output(self, question: &str, output: EstimateOutput) -> Self {
        self.outputs.lock().insert(question.to_string(), output);
        self
    }

    pub fn failing_batch() -> Self {
        Self {
            batch_fails: true,
            ..Self::default()
        }
    }

    fn output_for(&self, question: &str) -> EstimateOutput {
        self.outputs
            .lock()
            .get(question)
            .cloned()
            .unwrap_or_else(|| estimate(0.5, Confidence::Medium))
    }
}

#[async_trait]
impl Estimator for ScriptedEstimator {
    fn select_model(&self, _volume: Option<f64>, premium: bool) -> String {
        if premium {
            "scripted-premium".to_string()
        } else {
            "scripted-model".to_string()
        }
    }

    async fn estimate(
        &self,
        input: &BlindMarketInput,
        _volume: Option<f64>,
        _premium: bool,
    ) -> Result<EstimateOutput> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output_for(&input.question))
    }

    async fn estimate_batch(
        &self,
        items: &[(String, BlindMarketInput)],
    ) -> Result<HashMap<String, EstimateOutput>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.batch_fails {
            return Err(ResearchError::BatchTimeout { timeout_secs: 1 }.into());
        }
        Ok(items
            .iter()
            .map(|(id, input)| (id.clone(), self.output_for(&input.question)))
            .collect())
    }

    async fn screen(&self, input: &BlindMarketInput) -> bool {
        !self.screen_rejects.lock().contains(&input.question)
    }
}

/// Notifier double recording every call.
#[derive(Default)]
pub struct RecordingNotifier {
    pub scan_alerts: Mutex<Vec<RecommendationAlert>>,
    pub sweep_alerts: Mutex<Vec<TradeAlert>>,
    pub resolution_alerts: Mutex<Vec<ResolutionAlert>>,
    pub failures: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn scan_results(
        &self,
        recommendations: &[RecommendationAlert],
        _stats: ScanStats,
    ) -> ChannelResults {
        self.scan_alerts.lock().extend_from_slice(recommendations);
        ChannelResults::new()
    }

    async fn sweep_trades(&self, trades: &[TradeAlert]) -> ChannelResults {
        self.sweep_alerts.lock().extend_from_slice(trades);
        ChannelResults::new()
    }

    async fn resolutions(&self, resolved: &[ResolutionAlert]) -> ChannelResults {
        self.resolution_alerts.lock().extend_from_slice(resolved);
        ChannelResults::new()
    }

    async fn job_failure(&self, job: &str, error: &str) -> ChannelResults {
        self.failures
            .lock()
            .push((job.to_string(), error.to_string()));
        ChannelResults::new()
    }

    async fn daily_digest(&self, _digest: &DigestReport) -> ChannelResults {
        ChannelResults::new()
    }
}
