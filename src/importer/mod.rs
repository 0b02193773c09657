//! Run-controller plumbing shared by both pipelines: run mode, stage
//! tracking and the end-of-run summary.

pub mod prices;
pub mod stocks;

use std::collections::BTreeMap;
use std::time::Duration;

/// Whether a run is allowed to touch the destination.
///
/// A dry run executes the read and transform stages through the exact
/// same code paths as a live run and short-circuits before the write
/// stage; it is a mode of the run controller, not a flag checked inside
/// write logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    DryRun,
    Live,
}

impl RunMode {
    pub fn is_dry_run(self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

/// Pipeline stages, in the order a run moves through them. `Failed` is
/// reachable from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Reading,
    Transforming,
    Writing,
    Reporting,
    Done,
    Failed,
}

impl Stage {
    /// Record a transition in the trace log.
    pub fn advance(&mut self, next: Stage) {
        tracing::debug!("stage {:?} -> {:?}", self, next);
        *self = next;
    }
}

/// What one run did, for the final report and the exit status.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub dry_run: bool,
    pub rows_read: usize,
    pub rows_written: usize,
    pub rows_skipped: usize,
    /// Skip counts bucketed by reason.
    pub skip_reasons: BTreeMap<String, usize>,
    /// Tickers that failed wholesale, with the reason.
    pub failed_symbols: Vec<(String, String)>,
    pub elapsed: Duration,
}

impl ImportSummary {
    pub fn new(mode: RunMode) -> Self {
        ImportSummary {
            dry_run: mode.is_dry_run(),
            ..ImportSummary::default()
        }
    }

    pub fn record_skip(&mut self, reason: impl Into<String>) {
        self.record_skips(reason, 1);
    }

    pub fn record_skips(&mut self, reason: impl Into<String>, count: usize) {
        self.rows_skipped += count;
        *self.skip_reasons.entry(reason.into()).or_insert(0) += count;
    }

    pub fn record_failed_symbol(&mut self, symbol: &str, reason: impl Into<String>) {
        self.failed_symbols.push((symbol.to_string(), reason.into()));
    }

    /// Print the end-of-run report.
    pub fn print_report(&self, title: &str) {
        println!();
        println!(
            "📊 {title} ({})",
            if self.dry_run {
                "dry run (no writes)"
            } else {
                "live run"
            }
        );
        println!("=====================================");
        println!("Rows read:    {}", self.rows_read);
        println!("Rows written: {}", self.rows_written);
        println!("Rows skipped: {}", self.rows_skipped);
        for (reason, count) in &self.skip_reasons {
            println!("  - {reason}: {count}");
        }
        if !self.failed_symbols.is_empty() {
            println!("❌ Failed tickers:");
            for (symbol, reason) in &self.failed_symbols {
                println!("   {symbol}: {reason}");
            }
        }
        println!("⏱️  Elapsed: {:.2}s", self.elapsed.as_secs_f64());
    }
}
