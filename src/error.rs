use thiserror::Error;

/// Failures surfaced by the import pipelines.
///
/// Row-level (`Validation`) and ticker-level (`RateLimited`,
/// `SymbolNotFound`, per-ticker `SourceUnavailable`) failures are
/// recovered by the run controllers, counted, and reported in the run
/// summary. Everything else aborts the run.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Source file or remote endpoint cannot be reached.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The source does not look like the expected sheet or payload.
    #[error("unexpected source format: {0}")]
    SourceFormat(String),

    /// One row or bar failed validation and was skipped.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The gateway kept answering 429 after every retry.
    #[error("rate limited fetching {symbol} after {attempts} attempts")]
    RateLimited { symbol: String, attempts: u32 },

    /// The gateway does not quote this symbol.
    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    /// The destination rejected a statement or transaction.
    #[error("database write failed: {0}")]
    Write(#[from] sqlx::Error),
}

impl ImportError {
    /// Short label used to bucket skip counts in the run summary.
    pub fn reason_label(&self) -> String {
        match self {
            ImportError::Validation { field, .. } => format!("invalid {field}"),
            ImportError::RateLimited { .. } => "rate limited".to_string(),
            ImportError::SymbolNotFound { .. } => "symbol not found".to_string(),
            ImportError::SourceUnavailable(_) => "source unavailable".to_string(),
            ImportError::SourceFormat(_) => "bad source format".to_string(),
            ImportError::Write(_) => "write failed".to_string(),
        }
    }
}
