use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::error::ImportError;
use crate::models::{PortfolioHolding, PriceRecord, Stock};

/// Outcome of one ticker's price-history write.
#[derive(Debug, Default, Clone, Copy)]
pub struct PriceWriteOutcome {
    pub inserted: u64,
    pub skipped_existing: u64,
}

/// Destination handle for one import run.
///
/// The pool is capped at a single connection: the pipelines are
/// sequential and every transaction runs on the same handle, opened at
/// run start and released when the handle drops.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the destination and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, ImportError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Database { pool };
        db.run_migrations().await?;
        info!("Database initialized at {}", database_url);

        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), ImportError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS stocks (
                stock_code TEXT PRIMARY KEY,
                stock_name TEXT NOT NULL,
                market TEXT,
                industry TEXT,
                industry_code_33 TEXT,
                industry_code_17 TEXT,
                scale_code TEXT,
                scale_category TEXT,
                listed_date DATE,
                data_date DATE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS portfolio_holdings (
                holding_id INTEGER PRIMARY KEY AUTOINCREMENT,
                stock_code TEXT NOT NULL REFERENCES stocks(stock_code),
                broker TEXT,
                purchase_date DATE,
                purchase_price REAL,
                quantity INTEGER,
                current_price REAL,
                notes TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS trading_plans (
                plan_id INTEGER PRIMARY KEY AUTOINCREMENT,
                stock_code TEXT NOT NULL REFERENCES stocks(stock_code),
                analysis_date DATE,
                analysis_type TEXT,
                allocation_percentage REAL,
                notes TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        // Plan child rows cannot outlive their plan.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS trade_decisions (
                decision_id INTEGER PRIMARY KEY AUTOINCREMENT,
                plan_id INTEGER NOT NULL
                    REFERENCES trading_plans(plan_id) ON DELETE CASCADE,
                side TEXT NOT NULL,
                target_price REAL,
                decided_at DATE,
                notes TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS risk_assessments (
                assessment_id INTEGER PRIMARY KEY AUTOINCREMENT,
                plan_id INTEGER NOT NULL
                    REFERENCES trading_plans(plan_id) ON DELETE CASCADE,
                risk_level TEXT,
                max_loss_percentage REAL,
                notes TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS monitoring_points (
                point_id INTEGER PRIMARY KEY AUTOINCREMENT,
                plan_id INTEGER NOT NULL
                    REFERENCES trading_plans(plan_id) ON DELETE CASCADE,
                metric TEXT,
                threshold REAL,
                notes TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS trading_conditions (
                condition_id INTEGER PRIMARY KEY AUTOINCREMENT,
                plan_id INTEGER NOT NULL
                    REFERENCES trading_plans(plan_id) ON DELETE CASCADE,
                condition_type TEXT,
                detail TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        // No FK to stocks: price history must survive a listing reload
        // that drops a delisted code.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS stock_prices_history (
                price_id INTEGER PRIMARY KEY AUTOINCREMENT,
                stock_code TEXT NOT NULL,
                price_date DATE NOT NULL,
                open_price REAL,
                high_price REAL,
                low_price REAL,
                close_price REAL NOT NULL,
                volume INTEGER,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(stock_code, price_date)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_prices_history_code_date
             ON stock_prices_history(stock_code, price_date)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_holdings_stock_code
             ON portfolio_holdings(stock_code)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_plans_stock_code
             ON trading_plans(stock_code)",
        )
        .execute(&self.pool)
        .await?;

        debug!("Database migrations completed");
        Ok(())
    }

    /// Distinct tickers referenced by holdings or trading plans, sorted.
    pub async fn held_stock_codes(&self) -> Result<Vec<String>, ImportError> {
        let codes = sqlx::query_scalar::<_, String>(
            "SELECT stock_code FROM portfolio_holdings
             UNION
             SELECT stock_code FROM trading_plans
             ORDER BY stock_code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }

    /// Atomically replace the whole `stocks` table with a new listing.
    ///
    /// Delete and reload commit together; on any failure the previous
    /// listing stays visible. FK checks are deferred to commit so that
    /// holdings and plans keep their references across the swap; a
    /// reload that would orphan one fails instead of half-applying.
    pub async fn replace_stocks(
        &self,
        stocks: &[Stock],
        batch_size: usize,
    ) -> Result<u64, ImportError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("PRAGMA defer_foreign_keys = ON")
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM stocks")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        debug!("cleared {} existing listing rows", deleted);

        let mut written = 0u64;
        for chunk in stocks.chunks(batch_size.max(1)) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO stocks (stock_code, stock_name, market, industry, \
                 industry_code_33, industry_code_17, scale_code, scale_category, \
                 listed_date, data_date) ",
            );
            builder.push_values(chunk, |mut b, stock| {
                b.push_bind(&stock.stock_code)
                    .push_bind(&stock.stock_name)
                    .push_bind(&stock.market)
                    .push_bind(&stock.industry)
                    .push_bind(&stock.industry_code_33)
                    .push_bind(&stock.industry_code_17)
                    .push_bind(&stock.scale_code)
                    .push_bind(&stock.scale_category)
                    .push_bind(stock.listed_date)
                    .push_bind(stock.data_date);
            });
            written += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    /// Store one ticker's validated bars and refresh `current_price` on
    /// its holdings, in one transaction.
    ///
    /// Dates already present are skipped, not overwritten; the conflict
    /// is expected and counted, never an error.
    pub async fn store_price_history(
        &self,
        stock_code: &str,
        records: &[PriceRecord],
        batch_size: usize,
    ) -> Result<PriceWriteOutcome, ImportError> {
        let mut tx = self.pool.begin().await?;

        let mut inserted = 0u64;
        for chunk in records.chunks(batch_size.max(1)) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO stock_prices_history (stock_code, price_date, \
                 open_price, high_price, low_price, close_price, volume) ",
            );
            builder.push_values(chunk, |mut b, record| {
                b.push_bind(&record.stock_code)
                    .push_bind(record.price_date)
                    .push_bind(record.open)
                    .push_bind(record.high)
                    .push_bind(record.low)
                    .push_bind(record.close)
                    .push_bind(record.volume);
            });
            builder.push(" ON CONFLICT(stock_code, price_date) DO NOTHING");
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        if let Some(latest) = records.iter().max_by_key(|r| r.price_date) {
            let updated = sqlx::query(
                "UPDATE portfolio_holdings
                 SET current_price = ?1, updated_at = CURRENT_TIMESTAMP
                 WHERE stock_code = ?2",
            )
            .bind(latest.close)
            .bind(stock_code)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if updated > 0 {
                debug!(
                    "refreshed current_price to {} on {} holding(s) of {}",
                    latest.close, updated, stock_code
                );
            }
        }

        tx.commit().await?;

        Ok(PriceWriteOutcome {
            inserted,
            skipped_existing: records.len() as u64 - inserted,
        })
    }

    /// Holdings of one ticker, oldest lot first.
    pub async fn holdings_for(&self, stock_code: &str) -> Result<Vec<PortfolioHolding>, ImportError> {
        let holdings = sqlx::query_as::<_, PortfolioHolding>(
            "SELECT holding_id, stock_code, broker, purchase_date, purchase_price,
                    quantity, current_price, notes
             FROM portfolio_holdings WHERE stock_code = ?1
             ORDER BY holding_id",
        )
        .bind(stock_code)
        .fetch_all(&self.pool)
        .await?;

        Ok(holdings)
    }

    pub async fn get_stock(&self, stock_code: &str) -> Result<Option<Stock>, ImportError> {
        let stock = sqlx::query_as::<_, Stock>(
            "SELECT stock_code, stock_name, market, industry, industry_code_33,
                    industry_code_17, scale_code, scale_category, listed_date, data_date
             FROM stocks WHERE stock_code = ?1",
        )
        .bind(stock_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stock)
    }

    pub async fn count_stocks(&self) -> Result<i64, ImportError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stocks")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Price-history row count, for the whole table or one ticker.
    pub async fn count_price_rows(&self, stock_code: Option<&str>) -> Result<i64, ImportError> {
        let count = match stock_code {
            Some(code) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM stock_prices_history WHERE stock_code = ?1",
                )
                .bind(code)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stock_prices_history")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        Ok(count)
    }
}
