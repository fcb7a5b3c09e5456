//! Command-line interface.

mod balance;
mod bet;
mod bootstrap;
mod positions;
mod resolutions;
mod results;
mod run;
mod scan;

pub use bootstrap::App;

use clap::{Parser, Subcommand};

use crate::error::Result;

/// augur - AI edge detection and automated trading for binary
/// prediction markets.
#[derive(Parser, Debug)]
#[command(name = "augur")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Database file (overrides DATABASE_URL)
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler daemon (scans, resolution checks, trade sync)
    Run,

    /// Execute one full market scan now
    Scan(ScanArgs),

    /// Show venue account balance, positions, and resting orders
    Balance,

    /// Place a limit buy on the venue
    Bet(BetArgs),

    /// List open positions tracked locally
    Positions,

    /// Show forecast performance, calibration, and API spend
    Results(ResultsArgs),

    /// Run one resolution check pass now
    Resolutions,
}

#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Estimate via one batch job instead of per-market calls
    #[arg(long)]
    pub batch: bool,
}

#[derive(clap::Args, Debug)]
pub struct BetArgs {
    /// Market ticker (e.g. KXNBAGAME-26FEB19DETNYK-DET)
    pub ticker: String,
    /// Side to buy
    #[arg(value_parser = ["yes", "no"])]
    pub side: String,
    /// Number of contracts
    pub count: i64,
    /// YES price in cents (1-99)
    pub price: i64,
    /// Verify auth and print the order without placing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug)]
pub struct ResultsArgs {
    /// Restrict to one market category (e.g. NBA, CPI)
    #[arg(long)]
    pub category: Option<String>,
}

/// Dispatch the parsed command.
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run => run::execute(cli.database).await,
        Commands::Scan(args) => scan::execute(cli.database, &args).await,
        Commands::Balance => balance::execute(cli.database).await,
        Commands::Bet(args) => bet::execute(cli.database, &args).await,
        Commands::Positions => positions::execute(cli.database).await,
        Commands::Results(args) => results::execute(cli.database, &args).await,
        Commands::Resolutions => resolutions::execute(cli.database).await,
    }
}
