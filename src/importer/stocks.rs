//! Listing-sheet import: truncate-and-reload of the `stocks` table.

use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use crate::database::Database;
use crate::error::ImportError;
use crate::importer::{ImportSummary, RunMode, Stage};
use crate::models::Stock;
use crate::spreadsheet::ListingSheetReader;
use crate::transform;

/// Run the listing-sheet import.
///
/// A live run replaces the whole `stocks` table in one transaction. A
/// dry run stops at the write boundary and needs no destination at all,
/// so `db` may be `None` for it.
pub async fn run(
    path: &Path,
    db: Option<&Database>,
    mode: RunMode,
    batch_size: usize,
) -> Result<ImportSummary, ImportError> {
    let started = Instant::now();
    let mut stage = Stage::Idle;
    let mut summary = ImportSummary::new(mode);

    match run_pipeline(path, db, mode, batch_size, &mut stage, &mut summary).await {
        Ok(()) => {
            summary.elapsed = started.elapsed();
            stage.advance(Stage::Done);
            Ok(summary)
        }
        Err(err) => {
            stage.advance(Stage::Failed);
            Err(err)
        }
    }
}

async fn run_pipeline(
    path: &Path,
    db: Option<&Database>,
    mode: RunMode,
    batch_size: usize,
    stage: &mut Stage,
    summary: &mut ImportSummary,
) -> Result<(), ImportError> {
    stage.advance(Stage::Reading);
    let mut reader = ListingSheetReader::open(path)?;

    stage.advance(Stage::Transforming);
    let mut validated: Vec<Stock> = Vec::new();
    for row in reader.rows() {
        summary.rows_read += 1;
        match row.and_then(|raw| transform::stock_from_listing_row(&raw)) {
            Ok(stock) => validated.push(stock),
            Err(err) => {
                warn!("row {} skipped: {err}", summary.rows_read);
                summary.record_skip(err.reason_label());
            }
        }
    }
    info!(
        "{} rows read, {} valid, {} skipped",
        summary.rows_read,
        validated.len(),
        summary.rows_skipped
    );

    match mode {
        RunMode::DryRun => {
            info!("dry run: stopping before the write stage");
        }
        RunMode::Live => {
            stage.advance(Stage::Writing);
            let db = db.ok_or_else(|| {
                ImportError::SourceUnavailable("no destination handle for a live run".to_string())
            })?;
            summary.rows_written = db.replace_stocks(&validated, batch_size).await? as usize;
            info!("listing replaced: {} rows now in stocks", summary.rows_written);
        }
    }

    stage.advance(Stage::Reporting);
    Ok(())
}
