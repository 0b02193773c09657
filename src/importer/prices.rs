//! Price-history import: fetch bars for every held ticker and append
//! the new dates, one ticker at a time.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::api::{BarInterval, HistoryPeriod, PriceHistoryProvider};
use crate::database::Database;
use crate::error::ImportError;
use crate::importer::{ImportSummary, RunMode, Stage};
use crate::models::PriceRecord;
use crate::transform;

/// Price-history run controller.
///
/// Reads the held-ticker list from the destination, then walks it
/// sequentially: fetch, transform, write. One ticker's failure is
/// recorded and the run moves on; completed tickers stay committed.
pub struct PriceHistoryImporter<'a, P: PriceHistoryProvider> {
    db: &'a Database,
    provider: &'a P,
    pub period: HistoryPeriod,
    pub interval: BarInterval,
    pub batch_size: usize,
    /// Restrict the run to one held ticker (spot checks).
    pub only_symbol: Option<String>,
}

impl<'a, P: PriceHistoryProvider> PriceHistoryImporter<'a, P> {
    pub fn new(db: &'a Database, provider: &'a P) -> Self {
        Self {
            db,
            provider,
            period: HistoryPeriod::default(),
            interval: BarInterval::default(),
            batch_size: 500,
            only_symbol: None,
        }
    }

    pub async fn run(&self, mode: RunMode) -> Result<ImportSummary, ImportError> {
        let started = Instant::now();
        let mut stage = Stage::Idle;
        let mut summary = ImportSummary::new(mode);

        match self.run_pipeline(mode, &mut stage, &mut summary).await {
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
        &self,
        mode: RunMode,
        stage: &mut Stage,
        summary: &mut ImportSummary,
    ) -> Result<(), ImportError> {
        stage.advance(Stage::Reading);
        let mut codes = self.db.held_stock_codes().await?;
        if let Some(only) = &self.only_symbol {
            codes.retain(|code| code == only);
        }
        if codes.is_empty() {
            info!("no held tickers to fetch");
            stage.advance(Stage::Reporting);
            return Ok(());
        }
        info!(
            "fetching {} over {} for {} ticker(s)",
            self.interval,
            self.period,
            codes.len()
        );

        let progress = ProgressBar::new(codes.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        for code in &codes {
            progress.set_message(code.clone());
            if let Err(err) = self.import_one(code, mode, stage, summary).await {
                warn!("{code}: {err}");
                summary.record_failed_symbol(code, err.to_string());
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        stage.advance(Stage::Reporting);
        info!(
            "{} ticker(s) processed, {} failed",
            codes.len(),
            summary.failed_symbols.len()
        );
        Ok(())
    }

    /// One ticker through the whole pipeline. Errors returned here mark
    /// the ticker as failed without touching the rest of the run.
    async fn import_one(
        &self,
        code: &str,
        mode: RunMode,
        stage: &mut Stage,
        summary: &mut ImportSummary,
    ) -> Result<(), ImportError> {
        stage.advance(Stage::Reading);
        let bars = self
            .provider
            .fetch_history(code, self.period, self.interval)
            .await?;
        if bars.is_empty() {
            return Err(ImportError::SourceUnavailable(
                "no bars returned".to_string(),
            ));
        }
        summary.rows_read += bars.len();

        stage.advance(Stage::Transforming);
        let mut records: Vec<PriceRecord> = Vec::with_capacity(bars.len());
        for bar in &bars {
            match transform::price_record_from_bar(code, bar) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!("{code} bar skipped: {err}");
                    summary.record_skip(err.reason_label());
                }
            }
        }

        if mode.is_dry_run() {
            info!("{code}: {} valid bar(s), dry run, nothing written", records.len());
            return Ok(());
        }

        stage.advance(Stage::Writing);
        let outcome = self
            .db
            .store_price_history(code, &records, self.batch_size)
            .await?;
        summary.rows_written += outcome.inserted as usize;
        if outcome.skipped_existing > 0 {
            summary.record_skips("already stored", outcome.skipped_existing as usize);
        }
        info!(
            "{code}: {} inserted, {} already stored",
            outcome.inserted, outcome.skipped_existing
        );
        Ok(())
    }
}
