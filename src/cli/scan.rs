//! Handler for the `scan` command.

use owo_colors::OwoColorize;

use crate::application::scanner::EstimateMode;
use crate::error::Result;

use super::{App, ScanArgs};

pub async fn execute(database: Option<String>, args: &ScanArgs) -> Result<()> {
    let app = App::bootstrap(database, false)?;
    let mode = if args.batch {
        EstimateMode::Batch
    } else {
        EstimateMode::Sync
    };

    println!("{}", "Scanning markets...".bold());
    let outcome = app.scanner.execute_scan(mode).await?;

    let duration = (outcome.completed_at - outcome.started_at).num_seconds();
    println!();
    println!("{}", "Scan complete".bold().green());
    println!("  Markets found:   {}", outcome.markets_found);
    println!("  Researched:      {}", outcome.markets_researched);
    println!("  Recommendations: {}", outcome.recommendations_created);
    println!("  Trades placed:   {}", outcome.trades_placed);
    println!("  Duration:        {duration}s");
    Ok(())
}
