use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ImportError;
use crate::models::GatewayBar;

pub mod gateway_client;
pub use gateway_client::PriceGatewayClient;

/// Simple rate limiter for gateway requests: a fixed delay before every
/// request, derived from the allowed requests per minute.
pub struct ApiRateLimiter {
    delay_ms: u64,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let delay_ms = if requests_per_minute > 0 {
            60_000 / requests_per_minute as u64
        } else {
            1000 // Default 1 second delay
        };

        Self { delay_ms }
    }

    pub async fn wait(&self) {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
    }
}

/// How far back one history request reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryPeriod {
    OneMonth,
    ThreeMonths,
    #[default]
    OneYear,
    TwoYears,
    FiveYears,
    Max,
}

impl HistoryPeriod {
    /// Query-string token the gateway expects.
    pub fn as_query(self) -> &'static str {
        match self {
            HistoryPeriod::OneMonth => "1mo",
            HistoryPeriod::ThreeMonths => "3mo",
            HistoryPeriod::OneYear => "1y",
            HistoryPeriod::TwoYears => "2y",
            HistoryPeriod::FiveYears => "5y",
            HistoryPeriod::Max => "max",
        }
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

impl FromStr for HistoryPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1mo" => Ok(HistoryPeriod::OneMonth),
            "3mo" => Ok(HistoryPeriod::ThreeMonths),
            "1y" => Ok(HistoryPeriod::OneYear),
            "2y" => Ok(HistoryPeriod::TwoYears),
            "5y" => Ok(HistoryPeriod::FiveYears),
            "max" => Ok(HistoryPeriod::Max),
            other => Err(format!(
                "unknown period '{other}' (expected 1mo, 3mo, 1y, 2y, 5y or max)"
            )),
        }
    }
}

/// Sampling interval of the returned bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarInterval {
    #[default]
    Daily,
    Weekly,
}

impl BarInterval {
    pub fn as_query(self) -> &'static str {
        match self {
            BarInterval::Daily => "1d",
            BarInterval::Weekly => "1wk",
        }
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

impl FromStr for BarInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(BarInterval::Daily),
            "1wk" => Ok(BarInterval::Weekly),
            other => Err(format!("unknown interval '{other}' (expected 1d or 1wk)")),
        }
    }
}

/// Source of dated OHLCV bars for one ticker.
#[async_trait]
pub trait PriceHistoryProvider {
    /// Fetch the ticker's bars, oldest first. Per-ticker failures come
    /// back as `RateLimited`, `SymbolNotFound` or `SourceUnavailable`.
    async fn fetch_history(
        &self,
        stock_code: &str,
        period: HistoryPeriod,
        interval: BarInterval,
    ) -> Result<Vec<GatewayBar>, ImportError>;
}
