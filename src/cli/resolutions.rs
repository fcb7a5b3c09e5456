//! Handler for the `resolutions` command.

use owo_colors::OwoColorize;

use crate::error::Result;

use super::App;

pub async fn execute(database: Option<String>) -> Result<()> {
    let app = App::bootstrap(database, false)?;

    println!("{}", "Checking resolutions...".bold());
    let outcome = app.scanner.check_resolutions().await?;

    println!();
    println!("  Checked:   {}", outcome.markets_checked);
    println!("  Resolved:  {}", outcome.markets_resolved);
    println!("  Cancelled: {}", outcome.markets_cancelled);
    Ok(())
}
