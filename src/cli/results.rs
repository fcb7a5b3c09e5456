//! Handler for the `results` command: performance, calibration, and
//! API spend.

use owo_colors::OwoColorize;
use rust_decimal::Decimal;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::application::calibration;
use crate::error::Result;
use crate::port::outbound::store::{PerformanceStore, ResearchStore};

use super::{App, ResultsArgs};

#[derive(Tabled)]
struct BucketRow {
    #[tabled(rename = "Bucket")]
    bucket: String,
    #[tabled(rename = "Predicted")]
    predicted: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "N")]
    count: usize,
}

pub async fn execute(database: Option<String>, args: &ResultsArgs) -> Result<()> {
    let app = App::bootstrap(database, false)?;

    let records = app
        .store
        .performance_records(args.category.as_deref())
        .await?;
    if records.is_empty() {
        println!("No resolved forecasts yet.");
        return Ok(());
    }

    let total = records.len();
    let correct = records.iter().filter(|r| r.directionally_correct()).count();
    let avg_brier = records.iter().map(|r| r.brier_score).sum::<f64>() / total as f64;
    let total_pnl: Decimal = records.iter().filter_map(|r| r.pnl).sum();
    let simulated_pnl: Decimal = records.iter().filter_map(|r| r.simulated_pnl).sum();
    let avg_edge = records
        .iter()
        .map(|r| (r.ai_probability - r.market_price).abs())
        .sum::<f64>()
        / total as f64;

    match &args.category {
        Some(category) => println!("{} — {category}", "FORECAST PERFORMANCE".bold()),
        None => println!("{}", "FORECAST PERFORMANCE".bold()),
    }
    println!("  Resolved:       {total}");
    println!(
        "  Hit rate:       {:.1}% ({correct}/{total})",
        correct as f64 / total as f64 * 100.0
    );
    println!("  Avg Brier:      {avg_brier:.4}");
    println!("  Avg edge:       {:.1}%", avg_edge * 100.0);
    println!("  Realized P&L:   ${total_pnl}");
    println!("  Simulated P&L:  ${simulated_pnl}");

    let buckets = calibration::calibration_buckets(&records);
    if !buckets.is_empty() {
        let rows: Vec<BucketRow> = buckets
            .iter()
            .map(|b| BucketRow {
                bucket: format!("{:.0}-{:.0}%", b.bucket_min * 100.0, b.bucket_max * 100.0),
                predicted: format!("{:.0}%", b.predicted_avg * 100.0),
                actual: format!("{:.0}%", b.actual_frequency * 100.0),
                count: b.count,
            })
            .collect();
        println!("\n{}", "CALIBRATION".bold());
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    let costs = app.store.cost_summary().await?;
    println!("\n{}", "API SPEND".bold());
    println!("  Today:     ${:.4}", costs.total_cost_today);
    println!("  This week: ${:.4}", costs.total_cost_week);
    println!("  All time:  ${:.4}", costs.total_cost_all_time);
    println!("  Per scan:  ${:.4}", costs.cost_per_scan_avg);
    println!("  Calls:     {}", costs.total_api_calls);

    Ok(())
}
