use chrono::NaiveDate;
use serde::Deserialize;

/// One row of the `stocks` master table, keyed by the exchange's
/// ticker code.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Stock {
    pub stock_code: String,
    pub stock_name: String,
    pub market: Option<String>,
    pub industry: Option<String>,
    pub industry_code_33: Option<String>,
    pub industry_code_17: Option<String>,
    pub scale_code: Option<String>,
    pub scale_category: Option<String>,
    pub listed_date: Option<NaiveDate>,
    pub data_date: Option<NaiveDate>,
}

/// One row of `portfolio_holdings`. Holdings are maintained elsewhere;
/// the importers read them for the held-ticker list and refresh
/// `current_price` after a successful price fetch.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PortfolioHolding {
    pub holding_id: i64,
    pub stock_code: String,
    pub broker: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price: Option<f64>,
    pub quantity: Option<i64>,
    pub current_price: Option<f64>,
    pub notes: Option<String>,
}

/// One row of `trading_plans`. Plans contribute their ticker to the
/// held-ticker list; their child rows are out of the importers' hands.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TradingPlan {
    pub plan_id: i64,
    pub stock_code: String,
    pub analysis_date: Option<NaiveDate>,
    pub analysis_type: Option<String>,
    pub allocation_percentage: Option<f64>,
    pub notes: Option<String>,
}

/// Validated destination shape for one (ticker, date) price bar.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub stock_code: String,
    pub price_date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<i64>,
}

/// One bar exactly as the gateway returns it. Numeric fields stay
/// optional until the transformer has accepted them.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayBar {
    pub date: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

/// Price-history response envelope.
#[derive(Debug, Deserialize)]
pub struct GatewayHistory {
    pub symbol: String,
    pub bars: Vec<GatewayBar>,
}

/// Configuration for the import tools.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub listing_sheet_path: String,
    pub gateway_url: String,
    pub gateway_timeout_secs: u64,
    pub rate_limit_per_minute: u32,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub batch_size: usize,
    pub symbol_suffix: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./db/portfolio.db".to_string()),
            listing_sheet_path: std::env::var("LISTING_SHEET_PATH")
                .unwrap_or_else(|_| "./data/data_j.csv".to_string()),
            gateway_url: std::env::var("PRICE_GATEWAY_URL")
                .unwrap_or_else(|_| "http://localhost:8765".to_string()),
            gateway_timeout_secs: std::env::var("GATEWAY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            rate_limit_per_minute: std::env::var("RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            max_retries: std::env::var("MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            retry_backoff_ms: std::env::var("RETRY_BACKOFF_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),
            batch_size: std::env::var("BATCH_SIZE")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),
            symbol_suffix: std::env::var("SYMBOL_SUFFIX")
                .unwrap_or_else(|_| ".T".to_string()),
        })
    }
}
