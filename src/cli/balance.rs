//! Handler for the `balance` command.

use owo_colors::OwoColorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::error::Result;

use super::App;

#[derive(Tabled)]
struct PositionRow {
    #[tabled(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Side")]
    side: &'static str,
    #[tabled(rename = "Qty")]
    quantity: i64,
}

#[derive(Tabled)]
struct OrderRow {
    #[tabled(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Side")]
    side: String,
    #[tabled(rename = "Qty")]
    quantity: i64,
    #[tabled(rename = "Price")]
    price: String,
}

pub async fn execute(database: Option<String>) -> Result<()> {
    let app = App::bootstrap(database, false)?;

    let balance = app.exchange.fetch_balance().await?;
    println!("{}", "VENUE ACCOUNT".bold());
    println!("  Cash balance:    ${}", balance.cash);
    println!("  Portfolio value: ${}", balance.portfolio_value);
    println!("  Total:           ${}", balance.cash + balance.portfolio_value);

    let positions = app.exchange.fetch_positions().await?;
    let open: Vec<PositionRow> = positions
        .iter()
        .filter(|p| p.market_exposure != 0)
        .map(|p| PositionRow {
            ticker: p.ticker.clone(),
            side: if p.market_exposure > 0 { "YES" } else { "NO" },
            quantity: p.market_exposure.abs(),
        })
        .collect();
    if open.is_empty() {
        println!("\nNo open positions.");
    } else {
        println!("\n{} ({})", "OPEN POSITIONS".bold(), open.len());
        println!("{}", Table::new(open).with(Style::rounded()));
    }

    let resting = app.exchange.fetch_orders(Some("resting")).await?;
    if !resting.is_empty() {
        let rows: Vec<OrderRow> = resting
            .iter()
            .map(|o| OrderRow {
                ticker: o.ticker.clone(),
                side: o.side.as_str().to_uppercase(),
                quantity: if o.remaining_count > 0 {
                    o.remaining_count
                } else {
                    o.count
                },
                price: format!("{}¢", o.yes_price),
            })
            .collect();
        println!("\n{} ({})", "RESTING ORDERS".bold(), rows.len());
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    Ok(())
}
