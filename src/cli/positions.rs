//! Handler for the `positions` command.

use owo_colors::OwoColorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::error::Result;
use crate::port::outbound::store::{MarketStore, TradeStore};

use super::App;

#[derive(Tabled)]
struct TradeRow {
    #[tabled(rename = "Question")]
    question: String,
    #[tabled(rename = "Side")]
    side: String,
    #[tabled(rename = "Entry")]
    entry: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Opened")]
    opened: String,
}

pub async fn execute(database: Option<String>) -> Result<()> {
    let app = App::bootstrap(database, false)?;

    let trades = app.store.open_trades().await?;
    if trades.is_empty() {
        println!("No open positions.");
        return Ok(());
    }

    let mut rows = Vec::with_capacity(trades.len());
    for trade in &trades {
        let question = match app.store.get_market(&trade.market_id).await? {
            Some(market) => market.question.chars().take(50).collect(),
            None => trade.market_id.to_string(),
        };
        rows.push(TradeRow {
            question,
            side: trade.direction.as_str().to_uppercase(),
            entry: format!("{:.0}¢", trade.entry_price * 100.0),
            amount: format!("${}", trade.amount),
            source: trade.source.as_str().to_string(),
            opened: trade.created_at.format("%b %d %H:%M").to_string(),
        });
    }

    let exposure = app.store.total_open_exposure().await?;
    println!("{} ({})", "OPEN POSITIONS".bold(), trades.len());
    println!("{}", Table::new(rows).with(Style::rounded()));
    println!("Total deployed: ${exposure}");
    Ok(())
}
