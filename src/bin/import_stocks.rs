//! Replace the `stocks` listing from the exchange's listed-companies
//! sheet. Dry runs validate the sheet without opening the destination.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use portfolio_import::database::Database;
use portfolio_import::importer::{stocks, RunMode};
use portfolio_import::models::Config;

#[derive(Parser)]
#[command(author, version, about = "Replace the stocks listing from the exchange sheet")]
struct Cli {
    /// Sheet path (defaults to LISTING_SHEET_PATH)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Read and validate only; write nothing
    #[arg(long)]
    dry_run: bool,

    /// Rows per insert statement
    #[arg(long)]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let path = cli
        .file
        .unwrap_or_else(|| PathBuf::from(&config.listing_sheet_path));
    let batch_size = cli.batch_size.unwrap_or(config.batch_size);

    let (mode, db) = if cli.dry_run {
        (RunMode::DryRun, None)
    } else {
        (
            RunMode::Live,
            Some(Database::connect(&config.database_url).await?),
        )
    };

    let summary = stocks::run(&path, db.as_ref(), mode, batch_size).await?;
    summary.print_report("Listing sheet import");

    if let Some(db) = &db {
        info!("stocks table now holds {} rows", db.count_stocks().await?);
    }

    Ok(())
}
