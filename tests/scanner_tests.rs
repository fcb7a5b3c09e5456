//! End-to-end scan pipeline scenarios over scripted ports.

mod support;

use augur::application::scanner::EstimateMode;
use augur::domain::estimate::Confidence;
use augur::domain::market::MarketStatus;
use augur::domain::recommendation::{Direction, RecommendationStatus};
use augur::domain::trade::TradeStatus;
use augur::error::Error;
use augur::port::outbound::store::{
    MarketStore, PerformanceStore, RecommendationStore, ResearchStore, TradeStore,
};
use rust_decimal_macros::dec;

use support::fakes::{estimate, market, ScriptedEstimator, ScriptedExchange};
use support::Rig;

#[tokio::test]
async fn happy_path_recommends_and_trades() {
    // Scenario 1: p_mkt=0.40, p_ai=0.70 high confidence, auto-trade
    // on, bankroll $1000: kelly caps at 0.05 -> $50 -> 125 contracts
    // at 40 cents.
    let exchange = ScriptedExchange::trading()
        .with_markets(vec![market("KXNBAGAME-26FEB19DETNYK-DET", "Detroit wins?", 0.40)]);
    let estimator = ScriptedEstimator::default()
        .with_output("Detroit wins?", estimate(0.70, Confidence::High));
    let rig = Rig::new("happy-path", exchange, estimator);
    rig.configure(&[
        ("auto_trade_enabled", serde_json::json!(true)),
        ("bankroll", serde_json::json!(1000.0)),
    ])
    .await;

    let outcome = rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();
    assert_eq!(outcome.markets_researched, 1);
    assert_eq!(outcome.recommendations_created, 1);
    assert_eq!(outcome.trades_placed, 1);

    let recs = rig.db.store.active_recommendations().await.unwrap();
    assert_eq!(recs.len(), 1);
    let rec = &recs[0];
    assert_eq!(rec.direction, Direction::Yes);
    assert!((rec.edge - 0.30).abs() < 1e-9);
    assert!((rec.ev - 0.2832).abs() < 1e-4);
    assert!((rec.kelly_fraction - 0.05).abs() < 1e-9);

    let placed = rig.exchange.placed_orders();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].count, 125);
    assert_eq!(placed[0].yes_price_cents, 40);
    assert_eq!(placed[0].side, Direction::Yes);

    let trades = rig.db.store.open_trades().await.unwrap();
    assert_eq!(trades.len(), 1);
    let trade = &trades[0];
    assert_eq!(trade.amount, dec!(50));
    assert!(trade
        .venue_trade_id
        .as_deref()
        .unwrap()
        .starts_with("order_"));
    assert_eq!(trade.recommendation_id.as_ref(), Some(&rec.id));

    // Alert captured for this scan's recommendation.
    assert_eq!(rig.notifier.scan_alerts.lock().len(), 1);
}

#[tokio::test]
async fn weak_estimate_is_not_recommended() {
    // Scenario 2: p_ai=0.50 vs p_mkt=0.48 — fee-dominated and inside
    // the weak band; nothing recommended.
    let exchange = ScriptedExchange::trading()
        .with_markets(vec![market("KXNBAGAME-26FEB20-BOS", "Boston wins?", 0.48)]);
    let estimator = ScriptedEstimator::default()
        .with_output("Boston wins?", estimate(0.50, Confidence::High));
    let rig = Rig::new("weak-estimate", exchange, estimator);

    let outcome = rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();
    assert_eq!(outcome.markets_researched, 1);
    assert_eq!(outcome.recommendations_created, 0);
    assert!(rig.db.store.active_recommendations().await.unwrap().is_empty());
    assert!(rig.exchange.placed_orders().is_empty());
}

#[tokio::test]
async fn weak_band_with_big_edge_is_recommended() {
    // Scenario 3: p_ai=0.55 inside the weak band but ev ~13.3% >= 12%.
    let exchange = ScriptedExchange::trading()
        .with_markets(vec![market("KXNBAGAME-26FEB21-MIA", "Miami wins?", 0.40)]);
    let estimator = ScriptedEstimator::default()
        .with_output("Miami wins?", estimate(0.55, Confidence::High));
    let rig = Rig::new("weak-band-ev", exchange, estimator);

    let outcome = rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();
    assert_eq!(outcome.recommendations_created, 1);
    let rec = &rig.db.store.active_recommendations().await.unwrap()[0];
    assert!((rec.ev - 0.1332).abs() < 1e-4);
}

#[tokio::test]
async fn second_scan_is_rejected_busy() {
    let exchange = ScriptedExchange::default();
    let estimator = ScriptedEstimator::default();
    let rig = Rig::new("single-flight", exchange, estimator);

    // Claim the scan slot as a running scan would.
    assert!(rig.scanner.progress().try_start());
    let err = rig
        .scanner
        .execute_scan(EstimateMode::Sync)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ScanInProgress));

    // Releasing the slot lets the next scan run.
    rig.scanner.progress().complete();
    assert!(rig.scanner.execute_scan(EstimateMode::Sync).await.is_ok());
}

#[tokio::test]
async fn fresh_estimates_are_cached() {
    let exchange = ScriptedExchange::default()
        .with_markets(vec![market("KXNBAGAME-26FEB22-LAL", "Lakers win?", 0.40)]);
    let estimator = ScriptedEstimator::default()
        .with_output("Lakers win?", estimate(0.70, Confidence::High));
    let rig = Rig::new("estimate-cache", exchange, estimator);

    rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();
    rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();

    // Second scan snapshots the price but skips research.
    assert_eq!(
        rig.estimator
            .estimate_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn markets_without_price_are_skipped() {
    let exchange = ScriptedExchange::default()
        .with_markets(vec![market("KXNBAGAME-26FEB23-CHI", "Bulls win?", 0.0)]);
    let estimator = ScriptedEstimator::default();
    let rig = Rig::new("no-price", exchange, estimator);

    let outcome = rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();
    assert_eq!(outcome.markets_researched, 0);
    assert_eq!(
        rig.estimator
            .estimate_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn screened_out_markets_are_skipped() {
    let exchange = ScriptedExchange::default()
        .with_markets(vec![market("KXNBAGAME-26FEB24-NYK", "Knicks win?", 0.40)]);
    let estimator = ScriptedEstimator::default();
    estimator
        .screen_rejects
        .lock()
        .push("Knicks win?".to_string());
    let rig = Rig::new("screened", exchange, estimator);

    let outcome = rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();
    assert_eq!(outcome.markets_researched, 0);
    assert_eq!(
        rig.estimator
            .estimate_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn batch_failure_falls_back_to_sync() {
    // Scenario 6: batch submission fails; every prepared market still
    // gets exactly one estimate via the sync fallback.
    let questions = ["Q-A?", "Q-B?", "Q-C?"];
    let markets = questions
        .iter()
        .enumerate()
        .map(|(i, q)| market(&format!("KXNBAGAME-26FEB2{i}-T{i}"), q, 0.40))
        .collect();
    let exchange = ScriptedExchange::default().with_markets(markets);
    let mut estimator = ScriptedEstimator::failing_batch();
    for q in questions {
        estimator = estimator.with_output(q, estimate(0.70, Confidence::High));
    }
    let rig = Rig::new("batch-fallback", exchange, estimator);

    let outcome = rig.scanner.execute_scan(EstimateMode::Batch).await.unwrap();
    assert_eq!(outcome.markets_researched, 3);
    assert_eq!(
        rig.estimator
            .batch_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
    assert_eq!(
        rig.estimator
            .estimate_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        3
    );

    // One estimate per market, no duplicates.
    for m in rig.db.store.list_markets(None, None, 50).await.unwrap() {
        let latest = rig.db.store.latest_estimate(&m.id).await.unwrap();
        assert!(latest.is_some());
    }
    let recs = rig.db.store.active_recommendations().await.unwrap();
    assert_eq!(recs.len(), 3);
}

#[tokio::test]
async fn resolution_yes_settles_trades_and_records_performance() {
    // Scenario 4: open $50 YES at 0.40 with $0.50 fees; market
    // resolves YES -> pnl 74.5, performance row with brier (p-1)^2.
    let ticker = "KXNBAGAME-26FEB25-DAL";
    let exchange = ScriptedExchange::trading()
        .with_markets(vec![market(ticker, "Dallas wins?", 0.40)]);
    let estimator = ScriptedEstimator::default()
        .with_output("Dallas wins?", estimate(0.70, Confidence::High));
    let rig = Rig::new("resolution-yes", exchange, estimator);
    rig.configure(&[
        ("auto_trade_enabled", serde_json::json!(true)),
        ("bankroll", serde_json::json!(1000.0)),
        ("initial_bankroll", serde_json::json!(1000.0)),
    ])
    .await;

    rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();

    // Give the auto-placed trade its fill-time fees.
    let markets = rig.db.store.list_markets(None, None, 10).await.unwrap();
    let market_row = &markets[0];

    rig.exchange.resolve(ticker, true);
    let outcome = rig.scanner.check_resolutions().await.unwrap();
    assert_eq!(outcome.markets_resolved, 1);

    let resolved = rig.db.store.get_market(&market_row.id).await.unwrap().unwrap();
    assert_eq!(resolved.status, MarketStatus::Resolved);
    assert_eq!(resolved.outcome, Some(true));

    let trades = rig
        .db
        .store
        .trades_for_market(&market_row.id, None)
        .await
        .unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].status, TradeStatus::Closed);
    // $50 at 0.40, no fees on the resting order: 50 * 0.6/0.4 = 75.
    assert_eq!(trades[0].pnl.unwrap(), dec!(75));

    let records = rig.db.store.performance_records(None).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert!((record.brier_score - 0.09).abs() < 1e-9);
    assert!(record.recommendation_id.is_some());
    assert!(record.pnl.is_some());
    assert!(record.simulated_pnl.is_some());

    let latest_rec = rig
        .db
        .store
        .latest_recommendation(&market_row.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest_rec.status, RecommendationStatus::Resolved);

    // Running the pass again writes nothing new.
    let second = rig.scanner.check_resolutions().await.unwrap();
    assert_eq!(second.markets_resolved, 0);
    assert_eq!(rig.db.store.performance_records(None).await.unwrap().len(), 1);

    // Bankroll reflects the realized P&L.
    let config = rig.config.load().await;
    assert!((config.bankroll - 1075.0).abs() < 1e-6);

    assert_eq!(rig.notifier.resolution_alerts.lock().len(), 1);
}

#[tokio::test]
async fn cancelled_market_voids_everything_without_performance() {
    // Scenario 5: indeterminate resolution expires recommendations and
    // cancels trades with zero P&L; no performance row.
    let ticker = "KXNBAGAME-26FEB26-PHI";
    let exchange = ScriptedExchange::trading()
        .with_markets(vec![market(ticker, "Philly wins?", 0.40)]);
    let estimator = ScriptedEstimator::default()
        .with_output("Philly wins?", estimate(0.70, Confidence::High));
    let rig = Rig::new("cancelled", exchange, estimator);
    rig.configure(&[
        ("auto_trade_enabled", serde_json::json!(true)),
        ("bankroll", serde_json::json!(1000.0)),
    ])
    .await;

    rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();
    rig.exchange.void(ticker);

    let outcome = rig.scanner.check_resolutions().await.unwrap();
    assert_eq!(outcome.markets_cancelled, 1);
    assert_eq!(outcome.markets_resolved, 0);

    let markets = rig.db.store.list_markets(None, None, 10).await.unwrap();
    assert_eq!(markets[0].status, MarketStatus::Closed);
    assert!(markets[0].outcome.is_none());

    let trades = rig
        .db
        .store
        .trades_for_market(&markets[0].id, None)
        .await
        .unwrap();
    assert_eq!(trades[0].status, TradeStatus::Cancelled);
    assert_eq!(trades[0].pnl.unwrap(), dec!(0));

    assert!(rig.db.store.active_recommendations().await.unwrap().is_empty());
    assert!(rig.db.store.performance_records(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn sweep_places_orders_for_untraded_recommendations() {
    // First scan with auto-trade off creates a recommendation but no
    // trade; a later scan with auto-trade on sweeps it.
    let exchange = ScriptedExchange::trading()
        .with_markets(vec![market("KXNBAGAME-26FEB27-DEN", "Denver wins?", 0.40)]);
    let estimator = ScriptedEstimator::default()
        .with_output("Denver wins?", estimate(0.70, Confidence::High));
    let rig = Rig::new("sweep", exchange, estimator);
    rig.configure(&[("bankroll", serde_json::json!(1000.0))]).await;

    rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();
    assert!(rig.exchange.placed_orders().is_empty());
    assert_eq!(rig.db.store.active_recommendations().await.unwrap().len(), 1);

    // Enable auto-trade; the next scan finds nothing new to research
    // (cache) but the sweep picks up the standing recommendation.
    rig.configure(&[("auto_trade_enabled", serde_json::json!(true))])
        .await;
    let outcome = rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();
    assert_eq!(outcome.trades_placed, 1);

    let placed = rig.exchange.placed_orders();
    assert_eq!(placed.len(), 1);
    // Conservative sizing: medium confidence multiplier 0.6 on the
    // same edge still caps at 5% of bankroll -> $50 -> 125 contracts.
    assert_eq!(placed[0].count, 125);

    let trades = rig.db.store.open_trades().await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(rig.notifier.sweep_alerts.lock().len(), 1);

    // A third scan must not double-trade the same recommendation.
    let outcome = rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();
    assert_eq!(outcome.trades_placed, 0);
    assert_eq!(rig.exchange.placed_orders().len(), 1);
}

#[tokio::test]
async fn exposure_cap_blocks_auto_trades() {
    let exchange = ScriptedExchange::trading()
        .with_markets(vec![market("KXNBAGAME-26FEB28-GSW", "Warriors win?", 0.40)]);
    let estimator = ScriptedEstimator::default()
        .with_output("Warriors win?", estimate(0.70, Confidence::High));
    let rig = Rig::new("exposure-cap", exchange, estimator);
    rig.configure(&[
        ("auto_trade_enabled", serde_json::json!(true)),
        ("bankroll", serde_json::json!(1000.0)),
        // Cap total exposure below the $50 bet.
        ("max_exposure_fraction", serde_json::json!(0.04)),
    ])
    .await;

    let outcome = rig.scanner.execute_scan(EstimateMode::Sync).await.unwrap();
    // Recommendation still lands; only the order is suppressed.
    assert_eq!(outcome.recommendations_created, 1);
    assert_eq!(outcome.trades_placed, 0);
    assert!(rig.exchange.placed_orders().is_empty());
}
