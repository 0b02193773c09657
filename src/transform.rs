//! Pure row/bar transforms. No I/O happens here; every rejection names
//! the field that broke so the run summary can bucket it.

use chrono::NaiveDate;

use crate::error::ImportError;
use crate::models::{GatewayBar, PriceRecord, Stock};
use crate::spreadsheet::ListingRow;

/// The sheet writes `-` where it has no value.
fn clean(field: &str) -> Option<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed == "-" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Map one listing row onto the `stocks` schema.
pub fn stock_from_listing_row(row: &ListingRow) -> Result<Stock, ImportError> {
    let stock_code = clean(&row.stock_code).ok_or(ImportError::Validation {
        field: "コード",
        reason: "empty ticker code".to_string(),
    })?;
    let stock_name = clean(&row.stock_name).ok_or(ImportError::Validation {
        field: "銘柄名",
        reason: "empty name".to_string(),
    })?;

    let data_date = NaiveDate::parse_from_str(row.data_date.trim(), "%Y%m%d").map_err(|_| {
        ImportError::Validation {
            field: "日付",
            reason: format!("expected YYYYMMDD, got '{}'", row.data_date.trim()),
        }
    })?;

    // The 33-sector category is the finer classification; fall back to
    // the 17-sector one when the sheet has no 33-sector entry.
    let industry = clean(&row.industry_33).or_else(|| clean(&row.industry_17));

    Ok(Stock {
        stock_code,
        stock_name,
        market: clean(&row.market),
        industry,
        industry_code_33: clean(&row.industry_code_33),
        industry_code_17: clean(&row.industry_code_17),
        scale_code: clean(&row.scale_code),
        scale_category: clean(&row.scale_category),
        listed_date: None, // the sheet does not carry listing dates
        data_date: Some(data_date),
    })
}

fn required_price(value: Option<f64>, field: &'static str) -> Result<f64, ImportError> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(v) => Err(ImportError::Validation {
            field,
            reason: format!("not a usable price: {v}"),
        }),
        None => Err(ImportError::Validation {
            field,
            reason: "missing".to_string(),
        }),
    }
}

fn optional_price(value: Option<f64>, field: &'static str) -> Result<Option<f64>, ImportError> {
    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
        Some(v) => Err(ImportError::Validation {
            field,
            reason: format!("not a usable price: {v}"),
        }),
    }
}

/// Map one gateway bar onto the `stock_prices_history` schema.
///
/// The close is mandatory: a bar without a usable close is rejected,
/// never coerced to zero.
pub fn price_record_from_bar(stock_code: &str, bar: &GatewayBar) -> Result<PriceRecord, ImportError> {
    let price_date = NaiveDate::parse_from_str(bar.date.trim(), "%Y-%m-%d").map_err(|_| {
        ImportError::Validation {
            field: "date",
            reason: format!("expected YYYY-MM-DD, got '{}'", bar.date),
        }
    })?;

    let close = required_price(bar.close, "close")?;
    let open = optional_price(bar.open, "open")?;
    let high = optional_price(bar.high, "high")?;
    let low = optional_price(bar.low, "low")?;

    let volume = match bar.volume {
        Some(v) if v < 0 => {
            return Err(ImportError::Validation {
                field: "volume",
                reason: format!("negative: {v}"),
            })
        }
        other => other,
    };

    Ok(PriceRecord {
        stock_code: stock_code.to_string(),
        price_date,
        open,
        high,
        low,
        close,
        volume,
    })
}
