//! Handler for the `bet` command.

use owo_colors::OwoColorize;

use crate::domain::recommendation::Direction;
use crate::error::{Error, Result};
use crate::port::outbound::exchange::OrderRequest;

use super::{App, BetArgs};

pub async fn execute(database: Option<String>, args: &BetArgs) -> Result<()> {
    if !(1..=99).contains(&args.price) {
        return Err(Error::Execution(
            "price must be between 1 and 99 cents".to_string(),
        ));
    }
    if args.count < 1 {
        return Err(Error::Execution("count must be at least 1".to_string()));
    }
    let side = Direction::parse(&args.side)
        .ok_or_else(|| Error::Execution("side must be yes or no".to_string()))?;

    let app = App::bootstrap(database, false)?;
    if !app.exchange.supports_trading() {
        return Err(Error::Auth(
            "order placement requires RSA credentials (KALSHI_API_KEY + private key)"
                .to_string(),
        ));
    }

    let cost = match side {
        Direction::Yes => args.count as f64 * args.price as f64 / 100.0,
        Direction::No => args.count as f64 * (100 - args.price) as f64 / 100.0,
    };
    let potential = match side {
        Direction::Yes => args.count as f64 * (100 - args.price) as f64 / 100.0,
        Direction::No => args.count as f64 * args.price as f64 / 100.0,
    };

    println!("{}", "Order details:".bold());
    println!("  Ticker:    {}", args.ticker);
    println!("  Side:      {}", side.as_str().to_uppercase());
    println!("  Contracts: {}", args.count);
    println!("  Price:     {}¢ (YES price)", args.price);
    println!("  Cost:      ${cost:.2}");
    println!("  Potential: ${potential:.2} profit if correct");

    if args.dry_run {
        println!("\n  {} Order not placed.", "[DRY RUN]".yellow());
        return Ok(());
    }

    let ack = app
        .exchange
        .place_order(&OrderRequest {
            ticker: args.ticker.clone(),
            side,
            count: args.count,
            yes_price_cents: args.price,
        })
        .await?;

    println!(
        "\n  {} ID: {} | Status: {}",
        "Order placed!".green().bold(),
        ack.order_id,
        ack.status
    );
    Ok(())
}
