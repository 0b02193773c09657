use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::{ApiRateLimiter, BarInterval, HistoryPeriod, PriceHistoryProvider};
use crate::error::ImportError;
use crate::models::{Config, GatewayBar, GatewayHistory};

/// Client for the price-data gateway.
///
/// The gateway is a thin JSON-over-HTTP adapter in front of the market
/// data source: one endpoint, keyed by symbol + period + interval.
pub struct PriceGatewayClient {
    client: Client,
    base_url: Url,
    symbol_suffix: String,
    rate_limiter: ApiRateLimiter,
    max_retries: u32,
    retry_backoff: Duration,
}

impl PriceGatewayClient {
    /// Create a new gateway client.
    pub fn new(config: &Config) -> Result<Self, ImportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .user_agent("portfolio-import/0.1")
            .build()
            .map_err(|e| ImportError::SourceUnavailable(format!("gateway client: {e}")))?;

        let base_url = Url::parse(&config.gateway_url).map_err(|e| {
            ImportError::SourceFormat(format!("gateway url '{}': {e}", config.gateway_url))
        })?;

        Ok(Self {
            client,
            base_url,
            symbol_suffix: config.symbol_suffix.clone(),
            rate_limiter: ApiRateLimiter::new(config.rate_limit_per_minute),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// Exchange code to the symbol the gateway quotes it under
    /// (Tokyo-listed codes carry a `.T` suffix).
    pub fn gateway_symbol(&self, stock_code: &str) -> String {
        format!("{}{}", stock_code, self.symbol_suffix)
    }

    fn history_url(
        &self,
        symbol: &str,
        period: HistoryPeriod,
        interval: BarInterval,
    ) -> Result<Url, ImportError> {
        let mut url = self
            .base_url
            .join("v1/history")
            .map_err(|e| ImportError::SourceFormat(format!("gateway url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("symbol", symbol)
            .append_pair("period", period.as_query())
            .append_pair("interval", interval.as_query());
        Ok(url)
    }
}

#[async_trait::async_trait]
impl PriceHistoryProvider for PriceGatewayClient {
    async fn fetch_history(
        &self,
        stock_code: &str,
        period: HistoryPeriod,
        interval: BarInterval,
    ) -> Result<Vec<GatewayBar>, ImportError> {
        let symbol = self.gateway_symbol(stock_code);
        let url = self.history_url(&symbol, period, interval)?;

        let mut attempt = 0u32;
        loop {
            self.rate_limiter.wait().await;
            debug!("GET {}", url);

            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| ImportError::SourceUnavailable(format!("{symbol}: {e}")))?;

            match response.status() {
                StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= self.max_retries {
                        return Err(ImportError::RateLimited {
                            symbol,
                            attempts: attempt + 1,
                        });
                    }
                    let backoff = self.retry_backoff * 2u32.saturating_pow(attempt);
                    warn!(
                        "rate limited on {}, retrying in {:?} ({}/{})",
                        symbol,
                        backoff,
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                StatusCode::NOT_FOUND => return Err(ImportError::SymbolNotFound { symbol }),
                status if status.is_success() => {
                    let history: GatewayHistory = response
                        .json()
                        .await
                        .map_err(|e| ImportError::SourceFormat(format!("{symbol}: {e}")))?;
                    debug!("{}: {} bars received", history.symbol, history.bars.len());
                    return Ok(history.bars);
                }
                status => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ImportError::SourceUnavailable(format!(
                        "{symbol}: gateway returned {status}: {body}"
                    )));
                }
            }
        }
    }
}
