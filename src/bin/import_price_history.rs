//! Fetch daily price history for every held ticker and append it to
//! `stock_prices_history`, refreshing each holding's current price.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use portfolio_import::api::{BarInterval, HistoryPeriod, PriceGatewayClient};
use portfolio_import::database::Database;
use portfolio_import::importer::prices::PriceHistoryImporter;
use portfolio_import::importer::RunMode;
use portfolio_import::models::Config;

#[derive(Parser)]
#[command(author, version, about = "Fetch price history for held tickers")]
struct Cli {
    /// History window per ticker: 1mo, 3mo, 1y, 2y, 5y or max
    #[arg(long, default_value = "1y")]
    period: String,

    /// Bar interval: 1d or 1wk
    #[arg(long, default_value = "1d")]
    interval: String,

    /// Restrict the run to a single held ticker
    #[arg(long)]
    symbol: Option<String>,

    /// Fetch and validate only; write nothing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let period: HistoryPeriod = cli.period.parse().map_err(anyhow::Error::msg)?;
    let interval: BarInterval = cli.interval.parse().map_err(anyhow::Error::msg)?;

    let db = Database::connect(&config.database_url).await?;
    let client = PriceGatewayClient::new(&config)?;

    let mut importer = PriceHistoryImporter::new(&db, &client);
    importer.period = period;
    importer.interval = interval;
    importer.batch_size = config.batch_size;
    importer.only_symbol = cli.symbol;

    let mode = if cli.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Live
    };

    let summary = importer.run(mode).await?;
    summary.print_report("Price history import");

    if !mode.is_dry_run() {
        info!(
            "stock_prices_history now holds {} rows",
            db.count_price_rows(None).await?
        );
    }

    Ok(())
}
