//! In-memory destination setup and seeding helpers.

use portfolio_import::database::Database;

/// Fresh in-memory destination with the full schema applied.
pub async fn init_test_database() -> Database {
    Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

/// Seed a stock row directly, bypassing the importer.
pub async fn seed_stock(db: &Database, code: &str, name: &str) {
    sqlx::query("INSERT INTO stocks (stock_code, stock_name) VALUES (?1, ?2)")
        .bind(code)
        .bind(name)
        .execute(db.pool())
        .await
        .expect("Failed to seed stock");
}

/// Seed a holding for an existing stock.
pub async fn seed_holding(db: &Database, code: &str) {
    sqlx::query(
        "INSERT INTO portfolio_holdings (stock_code, broker, purchase_price, quantity)
         VALUES (?1, 'テスト証券', 2500.0, 100)",
    )
    .bind(code)
    .execute(db.pool())
    .await
    .expect("Failed to seed holding");
}

/// Seed a trading plan for an existing stock.
pub async fn seed_plan(db: &Database, code: &str) {
    sqlx::query(
        "INSERT INTO trading_plans (stock_code, analysis_type, allocation_percentage)
         VALUES (?1, '中期', 10.0)",
    )
    .bind(code)
    .execute(db.pool())
    .await
    .expect("Failed to seed plan");
}

/// Current prices recorded on every holding of one ticker.
pub async fn holding_current_prices(db: &Database, code: &str) -> Vec<Option<f64>> {
    db.holdings_for(code)
        .await
        .expect("Failed to read holdings")
        .into_iter()
        .map(|holding| holding.current_price)
        .collect()
}
