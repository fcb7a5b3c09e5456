use clap::Parser;
use tracing_subscriber::EnvFilter;

use augur::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    cli::execute(cli).await?;
    Ok(())
}
