//! Pipeline orchestrator.
//!
//! Composes the exchange, estimator, store, and notifier into the
//! scan pipeline: fetch → prepare → estimate → finalize → sweep, plus
//! the re-estimate and resolution passes. One scan runs at a time;
//! the progress tracker's `try_start` is the single-flight gate.

mod finalize;
mod prepare;
mod reestimate;
mod resolution;
mod sweep;

pub use prepare::PreparedMarket;
pub use resolution::ResolutionOutcome;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::application::calibration;
use crate::application::config::{ConfigResolver, RuntimeConfig};
use crate::application::progress::{MarketOutcome, ScanProgress, ScanSummary};
use crate::domain::id::ScanId;
use crate::domain::market::NormalizedMarket;
use crate::error::{Error, Result};
use crate::port::outbound::estimator::Estimator;
use crate::port::outbound::exchange::{Exchange, MarketQuery};
use crate::port::outbound::notifier::{Notifier, RecommendationAlert, ScanStats, TradeAlert};
use crate::port::outbound::store::{RecommendationStore, Store};

/// Concurrent research calls (prepare and estimate share this cap).
const RESEARCH_CONCURRENCY: usize = 5;

/// Markets must close at least this far in the future to be scanned.
const MIN_CLOSE_LEAD_HOURS: i64 = 2;

/// A scan recorded as running longer than this is considered crashed.
pub const STALE_SCAN_MINUTES: i64 = 120;

/// How estimates are produced during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EstimateMode {
    /// Per-market synchronous calls under the research semaphore.
    #[default]
    Sync,
    /// One batch job, falling back to sync per item on failure.
    Batch,
}

/// Summary statistics of one completed scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub scan_id: ScanId,
    pub markets_found: usize,
    pub markets_researched: usize,
    pub recommendations_created: usize,
    pub trades_placed: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Result of one market making it through finalize.
pub(crate) struct MarketResult {
    pub outcome: MarketOutcome,
    pub recommendation: Option<RecommendationAlert>,
    pub trade: Option<TradeAlert>,
}

/// The pipeline orchestrator. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct Scanner {
    pub(crate) store: Arc<dyn Store + Send + Sync>,
    pub(crate) exchange: Arc<dyn Exchange>,
    pub(crate) estimator: Arc<dyn Estimator>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) config: ConfigResolver,
    pub(crate) progress: Arc<ScanProgress>,
    pub(crate) research_semaphore: Arc<Semaphore>,
}

impl Scanner {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store + Send + Sync>,
        exchange: Arc<dyn Exchange>,
        estimator: Arc<dyn Estimator>,
        notifier: Arc<dyn Notifier>,
        config: ConfigResolver,
        progress: Arc<ScanProgress>,
    ) -> Self {
        Self {
            store,
            exchange,
            estimator,
            notifier,
            config,
            progress,
            research_semaphore: Arc::new(Semaphore::new(RESEARCH_CONCURRENCY)),
        }
    }

    #[must_use]
    pub fn progress(&self) -> &Arc<ScanProgress> {
        &self.progress
    }

    /// Execute a full scan. At most one scan runs at a time; a second
    /// caller gets [`Error::ScanInProgress`] immediately.
    pub async fn execute_scan(&self, mode: EstimateMode) -> Result<ScanOutcome> {
        if !self.progress.try_start() {
            return Err(Error::ScanInProgress);
        }

        match self.run_scan(mode).await {
            Ok(outcome) => {
                self.progress.complete();
                self.progress.save_summary(ScanSummary {
                    scan_id: outcome.scan_id.to_string(),
                    markets_found: outcome.markets_found,
                    markets_researched: outcome.markets_researched,
                    recommendations_created: outcome.recommendations_created,
                    trades_placed: outcome.trades_placed,
                    duration_seconds: (outcome.completed_at - outcome.started_at)
                        .num_milliseconds() as f64
                        / 1000.0,
                    completed_at: Some(outcome.completed_at),
                });
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, "scan failed");
                self.progress.fail(&e.to_string());
                Err(e)
            }
        }
    }

    async fn run_scan(&self, mode: EstimateMode) -> Result<ScanOutcome> {
        let started_at = Utc::now();
        let scan_id = ScanId::new();
        let config = self.config.load().await;

        if !self.exchange.is_configured() {
            return Err(Error::Auth("venue credentials not configured".to_string()));
        }

        // Close-date window, pushed down to the venue and re-checked
        // client-side.
        let min_close = started_at + Duration::hours(MIN_CLOSE_LEAD_HOURS);
        let max_close = started_at + Duration::hours(config.max_close_hours);

        let query = MarketQuery {
            limit: config.markets_per_platform,
            min_volume: config.min_volume,
            categories: None,
            min_close_ts: Some(min_close.timestamp()),
            max_close_ts: Some(max_close.timestamp()),
        };

        info!(
            scan_id = %scan_id,
            limit = query.limit,
            min_close = %min_close,
            max_close = %max_close,
            mode = ?mode,
            "scan starting"
        );

        let fetched = self.exchange.fetch_markets(&query).await?;
        let fetched_count = fetched.len();

        let markets: Vec<NormalizedMarket> = fetched
            .into_iter()
            .filter(|m| match m.close_at {
                Some(close_at) => close_at >= min_close && close_at <= max_close,
                None => false,
            })
            .collect();

        self.progress.set_markets_found(fetched_count, markets.len());
        info!(
            fetched = fetched_count,
            in_window = markets.len(),
            "markets fetched"
        );

        // One calibration read per scan, shared by every blind input.
        let feedback = calibration::feedback_for_category(&self.store, None)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "calibration feedback unavailable");
                None
            });

        let results = match mode {
            EstimateMode::Sync => {
                self.scan_sync(&config, &scan_id, markets, feedback).await
            }
            EstimateMode::Batch => {
                self.scan_batch(&config, &scan_id, markets, feedback).await
            }
        };

        // Recommendations can outlive their market's close date.
        if let Err(e) = self.store.expire_stale_recommendations(Utc::now()).await {
            warn!(error = %e, "stale recommendation expiry failed");
        }

        let mut markets_researched = 0;
        let mut recommendations_created = 0;
        let mut trades_placed = 0;
        let mut recommendation_alerts = Vec::new();
        let mut trade_alerts = Vec::new();
        for result in results {
            match result.outcome {
                MarketOutcome::Researched => markets_researched += 1,
                MarketOutcome::Recommended => {
                    markets_researched += 1;
                    recommendations_created += 1;
                }
                MarketOutcome::Skipped | MarketOutcome::Errored => {}
            }
            if let Some(alert) = result.recommendation {
                recommendation_alerts.push(alert);
            }
            if let Some(trade) = result.trade {
                trades_placed += 1;
                trade_alerts.push(trade);
            }
        }

        // Post-scan sweep: place orders for pre-existing active
        // recommendations that never got one.
        if config.auto_trade_enabled {
            match self.sweep_untraded(&config).await {
                Ok(swept) => {
                    trades_placed += swept.len();
                    trade_alerts.extend(swept);
                }
                Err(e) => warn!(error = %e, "post-scan sweep failed"),
            }
        }

        let completed_at = Utc::now();
        let outcome = ScanOutcome {
            scan_id,
            markets_found: fetched_count,
            markets_researched,
            recommendations_created,
            trades_placed,
            started_at,
            completed_at,
        };

        let stats = ScanStats {
            markets_found: outcome.markets_found,
            markets_researched: outcome.markets_researched,
            recommendations_created: outcome.recommendations_created,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
        };
        self.notifier
            .scan_results(&recommendation_alerts, stats)
            .await;
        if !trade_alerts.is_empty() {
            self.notifier.sweep_trades(&trade_alerts).await;
        }

        info!(
            scan_id = %outcome.scan_id,
            found = outcome.markets_found,
            researched = outcome.markets_researched,
            recommended = outcome.recommendations_created,
            trades = outcome.trades_placed,
            duration_s = stats.duration_seconds,
            "scan complete"
        );
        Ok(outcome)
    }

    /// Sync mode: each market runs prepare → estimate → finalize in
    /// its own task, bounded by the research semaphore.
    async fn scan_sync(
        &self,
        config: &RuntimeConfig,
        scan_id: &ScanId,
        markets: Vec<NormalizedMarket>,
        feedback: Option<String>,
    ) -> Vec<MarketResult> {
        let mut tasks: JoinSet<MarketResult> = JoinSet::new();
        for market in markets {
            let scanner = self.clone();
            let config = config.clone();
            let scan_id = scan_id.clone();
            let feedback = feedback.clone();
            tasks.spawn(async move {
                let permit = scanner.research_semaphore.clone().acquire_owned().await;
                let _permit = match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        return MarketResult {
                            outcome: MarketOutcome::Errored,
                            recommendation: None,
                            trade: None,
                        }
                    }
                };
                scanner
                    .process_market_sync(&config, &scan_id, market, feedback)
                    .await
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!(error = %e, "market task panicked"),
            }
        }
        results
    }

    async fn process_market_sync(
        &self,
        config: &RuntimeConfig,
        scan_id: &ScanId,
        market: NormalizedMarket,
        feedback: Option<String>,
    ) -> MarketResult {
        let question = market.question.clone();
        self.progress.market_processing(&question);

        let result = async {
            let Some(prepared) = self.prepare_market(config, &market, feedback).await?
            else {
                return Ok(MarketResult {
                    outcome: MarketOutcome::Skipped,
                    recommendation: None,
                    trade: None,
                });
            };

            let premium = config.use_premium_model;
            let output = self
                .estimator
                .estimate(&prepared.blind_input, prepared.volume, premium)
                .await?;
            let model = self.estimator.select_model(prepared.volume, premium);
            self.finalize_market(config, scan_id, &prepared, output, &model)
                .await
        }
        .await;

        match result {
            Ok(market_result) => {
                self.progress.market_done(market_result.outcome);
                market_result
            }
            Err(e) => {
                error!(
                    question = %question.chars().take(60).collect::<String>(),
                    error = %e,
                    "market processing failed"
                );
                self.progress.market_done(MarketOutcome::Errored);
                MarketResult {
                    outcome: MarketOutcome::Errored,
                    recommendation: None,
                    trade: None,
                }
            }
        }
    }

    /// Batch mode: prepare everything first, submit one batch job,
    /// finalize each succeeded entry, and fall back to sync
    /// estimation for anything the batch did not cover.
    async fn scan_batch(
        &self,
        config: &RuntimeConfig,
        scan_id: &ScanId,
        markets: Vec<NormalizedMarket>,
        feedback: Option<String>,
    ) -> Vec<MarketResult> {
        let mut results = Vec::new();

        // Concurrent prepare under the semaphore (the screen model is
        // an API call too).
        let mut prepare_tasks: JoinSet<Option<PreparedMarket>> = JoinSet::new();
        for market in markets {
            let scanner = self.clone();
            let config = config.clone();
            let feedback = feedback.clone();
            prepare_tasks.spawn(async move {
                let _permit = scanner
                    .research_semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .ok()?;
                scanner.progress.market_processing(&market.question);
                match scanner.prepare_market(&config, &market, feedback).await {
                    Ok(prepared) => {
                        if prepared.is_none() {
                            scanner.progress.market_done(MarketOutcome::Skipped);
                        }
                        prepared
                    }
                    Err(e) => {
                        error!(error = %e, "prepare failed");
                        scanner.progress.market_done(MarketOutcome::Errored);
                        None
                    }
                }
            });
        }

        let mut prepared_markets = Vec::new();
        while let Some(joined) = prepare_tasks.join_next().await {
            if let Ok(Some(prepared)) = joined {
                prepared_markets.push(prepared);
            }
        }
        if prepared_markets.is_empty() {
            return results;
        }

        let items: Vec<(String, _)> = prepared_markets
            .iter()
            .map(|p| (p.market_id.to_string(), p.blind_input.clone()))
            .collect();
        let total = items.len();
        self.progress.batch_status(total, 0);

        let mut batch_outputs = match self.estimator.estimate_batch(&items).await {
            Ok(outputs) if !outputs.is_empty() => outputs,
            Ok(_) => {
                warn!("batch returned no results, falling back to sync");
                Default::default()
            }
            Err(e) => {
                warn!(error = %e, "batch estimation failed, falling back to sync");
                Default::default()
            }
        };

        let batch_model = self.estimator.select_model(None, false);
        let mut completed = 0;
        for prepared in prepared_markets {
            completed += 1;
            self.progress.batch_status(total, completed);

            let result = match batch_outputs.remove(prepared.market_id.as_str()) {
                Some(output) => {
                    self.finalize_market(config, scan_id, &prepared, output, &batch_model)
                        .await
                }
                // Batch miss: estimate this market synchronously.
                None => {
                    let premium = config.use_premium_model;
                    match self
                        .estimator
                        .estimate(&prepared.blind_input, prepared.volume, premium)
                        .await
                    {
                        Ok(output) => {
                            let model =
                                self.estimator.select_model(prepared.volume, premium);
                            self.finalize_market(config, scan_id, &prepared, output, &model)
                                .await
                        }
                        Err(e) => Err(e),
                    }
                }
            };

            match result {
                Ok(market_result) => {
                    self.progress.market_done(market_result.outcome);
                    results.push(market_result);
                }
                Err(e) => {
                    error!(
                        market_id = %prepared.market_id,
                        error = %e,
                        "finalize failed"
                    );
                    self.progress.market_done(MarketOutcome::Errored);
                }
            }
        }
        results
    }
}
