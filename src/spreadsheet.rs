//! Listed-companies sheet reader.
//!
//! The sheet is the exchange's listing export, consumed as CSV with its
//! original column labels. Headers are validated before any row is
//! handed to the transformer, so a malformed sheet fails the run before
//! anything is written.

use std::fs::File;
use std::path::Path;

use csv::{Reader, ReaderBuilder, StringRecord};
use serde::Deserialize;
use tracing::info;

use crate::error::ImportError;

/// Column labels the sheet must carry.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "日付",
    "コード",
    "銘柄名",
    "市場・商品区分",
    "33業種コード",
    "33業種区分",
    "17業種コード",
    "17業種区分",
    "規模コード",
    "規模区分",
];

/// One sheet row, untouched apart from CSV decoding.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingRow {
    #[serde(rename = "日付")]
    pub data_date: String,
    #[serde(rename = "コード")]
    pub stock_code: String,
    #[serde(rename = "銘柄名")]
    pub stock_name: String,
    #[serde(rename = "市場・商品区分")]
    pub market: String,
    #[serde(rename = "33業種コード")]
    pub industry_code_33: String,
    #[serde(rename = "33業種区分")]
    pub industry_33: String,
    #[serde(rename = "17業種コード")]
    pub industry_code_17: String,
    #[serde(rename = "17業種区分")]
    pub industry_17: String,
    #[serde(rename = "規模コード")]
    pub scale_code: String,
    #[serde(rename = "規模区分")]
    pub scale_category: String,
}

/// Reader over the listing sheet. Rows come back in file order; the
/// stream is not restartable, re-open to retry.
#[derive(Debug)]
pub struct ListingSheetReader {
    reader: Reader<File>,
    headers: StringRecord,
}

impl ListingSheetReader {
    /// Open the sheet and verify the expected columns are present.
    pub fn open(path: &Path) -> Result<Self, ImportError> {
        let mut reader = ReaderBuilder::new()
            .from_path(path)
            .map_err(|e| ImportError::SourceUnavailable(format!("{}: {e}", path.display())))?;

        let headers = reader
            .headers()
            .map_err(|e| ImportError::SourceFormat(format!("{}: {e}", path.display())))?
            .clone();

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !headers.iter().any(|h| h == **col))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::SourceFormat(format!(
                "{}: missing columns {missing:?}",
                path.display()
            )));
        }

        info!("listing sheet opened: {}", path.display());
        Ok(Self { reader, headers })
    }

    /// Iterate rows. A row that cannot be decoded comes back as a
    /// `Validation` error so the caller can skip and count it without
    /// losing the rest of the sheet.
    pub fn rows(&mut self) -> impl Iterator<Item = Result<ListingRow, ImportError>> + '_ {
        let headers = self.headers.clone();
        self.reader.records().map(move |record| {
            let record = record.map_err(|e| ImportError::Validation {
                field: "row",
                reason: e.to_string(),
            })?;
            record
                .deserialize(Some(&headers))
                .map_err(|e| ImportError::Validation {
                    field: "row",
                    reason: e.to_string(),
                })
        })
    }
}
