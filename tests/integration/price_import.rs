//! Price-history import integration tests: upsert semantics, partial
//! failure, dry runs and the current-price refresh.

use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use portfolio_import::api::PriceGatewayClient;
use portfolio_import::database::Database;
use portfolio_import::importer::prices::PriceHistoryImporter;
use portfolio_import::importer::RunMode;

use crate::common::{database, fixtures};

async fn mock_history(server: &MockServer, symbol: &str, bars: &[(&str, f64)]) {
    Mock::given(method("GET"))
        .and(path("/v1/history"))
        .and(query_param("symbol", symbol))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::history_body(symbol, bars)))
        .mount(server)
        .await;
}

async fn seed_held_stock(db: &Database, code: &str, name: &str) {
    database::seed_stock(db, code, name).await;
    database::seed_holding(db, code).await;
}

fn importer<'a>(
    db: &'a Database,
    client: &'a PriceGatewayClient,
) -> PriceHistoryImporter<'a, PriceGatewayClient> {
    PriceHistoryImporter::new(db, client)
}

#[test_log::test(tokio::test)]
async fn rerunning_the_fetch_never_duplicates_a_date() {
    let db = database::init_test_database().await;
    let server = MockServer::start().await;
    seed_held_stock(&db, "7203", "トヨタ自動車").await;
    mock_history(
        &server,
        "7203.T",
        &[
            ("2025-08-04", 2860.0),
            ("2025-08-05", 2883.5),
            ("2025-08-06", 2871.0),
        ],
    )
    .await;

    let client = PriceGatewayClient::new(&fixtures::gateway_config(&server.uri())).expect("client");

    let first = importer(&db, &client).run(RunMode::Live).await.expect("first run");
    assert_eq!(first.rows_written, 3);
    assert_eq!(db.count_price_rows(Some("7203")).await.expect("count"), 3);

    let second = importer(&db, &client).run(RunMode::Live).await.expect("second run");
    assert_eq!(second.rows_written, 0);
    assert_eq!(second.skip_reasons.get("already stored"), Some(&3));
    assert_eq!(db.count_price_rows(Some("7203")).await.expect("count"), 3);
}

#[test_log::test(tokio::test)]
async fn a_rate_limited_ticker_does_not_abort_the_batch() {
    let db = database::init_test_database().await;
    let server = MockServer::start().await;
    seed_held_stock(&db, "1301", "極洋").await;
    seed_held_stock(&db, "7203", "トヨタ自動車").await;

    Mock::given(method("GET"))
        .and(path("/v1/history"))
        .and(query_param("symbol", "1301.T"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    mock_history(&server, "7203.T", &[("2025-08-05", 2883.5)]).await;

    let client = PriceGatewayClient::new(&fixtures::gateway_config(&server.uri())).expect("client");
    let summary = importer(&db, &client).run(RunMode::Live).await.expect("run");

    assert_eq!(summary.rows_written, 1);
    assert_eq!(summary.failed_symbols.len(), 1);
    assert_eq!(summary.failed_symbols[0].0, "1301");
    assert_eq!(db.count_price_rows(Some("1301")).await.expect("count"), 0);
    assert_eq!(db.count_price_rows(Some("7203")).await.expect("count"), 1);
}

#[test_log::test(tokio::test)]
async fn a_dry_run_fetches_but_writes_nothing() {
    let db = database::init_test_database().await;
    let server = MockServer::start().await;
    seed_held_stock(&db, "7203", "トヨタ自動車").await;
    mock_history(&server, "7203.T", &[("2025-08-04", 2860.0), ("2025-08-05", 2883.5)]).await;

    let client = PriceGatewayClient::new(&fixtures::gateway_config(&server.uri())).expect("client");
    let summary = importer(&db, &client).run(RunMode::DryRun).await.expect("dry run");

    assert!(summary.dry_run);
    assert_eq!(summary.rows_read, 2);
    assert_eq!(summary.rows_written, 0);
    assert_eq!(db.count_price_rows(None).await.expect("count"), 0);
    assert_eq!(
        database::holding_current_prices(&db, "7203").await,
        vec![None]
    );
}

#[test_log::test(tokio::test)]
async fn invalid_bars_are_skipped_without_aborting_the_ticker() {
    let db = database::init_test_database().await;
    let server = MockServer::start().await;
    seed_held_stock(&db, "7203", "トヨタ自動車").await;

    let body = serde_json::json!({
        "symbol": "7203.T",
        "bars": [
            { "date": "2025-08-04", "open": 2850.0, "high": 2875.5,
              "low": 2830.0, "close": 2860.0, "volume": 1_000_000i64 },
            { "date": "2025-08-05", "open": 2861.0, "high": 2890.0,
              "low": 2855.0, "close": null, "volume": 1_000_000i64 },
            { "date": "not-a-date", "open": 2861.0, "high": 2890.0,
              "low": 2855.0, "close": 2883.5, "volume": 1_000_000i64 },
        ]
    });
    Mock::given(method("GET"))
        .and(path("/v1/history"))
        .and(query_param("symbol", "7203.T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = PriceGatewayClient::new(&fixtures::gateway_config(&server.uri())).expect("client");
    let summary = importer(&db, &client).run(RunMode::Live).await.expect("run");

    assert_eq!(summary.rows_read, 3);
    assert_eq!(summary.rows_written, 1);
    assert_eq!(summary.rows_skipped, 2);
    assert_eq!(summary.skip_reasons.get("invalid close"), Some(&1));
    assert_eq!(summary.skip_reasons.get("invalid date"), Some(&1));
    assert!(summary.failed_symbols.is_empty());
    assert_eq!(db.count_price_rows(Some("7203")).await.expect("count"), 1);
}

#[test_log::test(tokio::test)]
async fn holdings_get_the_latest_close_as_current_price() {
    let db = database::init_test_database().await;
    let server = MockServer::start().await;
    seed_held_stock(&db, "7203", "トヨタ自動車").await;
    database::seed_holding(&db, "7203").await; // two lots of the same ticker
    mock_history(
        &server,
        "7203.T",
        &[("2025-08-04", 2860.0), ("2025-08-06", 2871.0), ("2025-08-05", 2883.5)],
    )
    .await;

    let client = PriceGatewayClient::new(&fixtures::gateway_config(&server.uri())).expect("client");
    importer(&db, &client).run(RunMode::Live).await.expect("run");

    // Newest date wins, whatever order the gateway sent.
    assert_eq!(
        database::holding_current_prices(&db, "7203").await,
        vec![Some(2871.0), Some(2871.0)]
    );
}

#[test_log::test(tokio::test)]
async fn plans_contribute_tickers_and_only_symbol_restricts() {
    let db = database::init_test_database().await;
    let server = MockServer::start().await;
    seed_held_stock(&db, "1301", "極洋").await;
    database::seed_stock(&db, "9984", "ソフトバンクグループ").await;
    database::seed_plan(&db, "9984").await;
    mock_history(&server, "1301.T", &[("2025-08-05", 3456.0)]).await;
    mock_history(&server, "9984.T", &[("2025-08-05", 8000.0)]).await;

    let client = PriceGatewayClient::new(&fixtures::gateway_config(&server.uri())).expect("client");

    let mut restricted = importer(&db, &client);
    restricted.only_symbol = Some("9984".to_string());
    let summary = restricted.run(RunMode::Live).await.expect("run");

    // Only the plan-held ticker was fetched.
    assert_eq!(summary.rows_written, 1);
    assert_eq!(db.count_price_rows(Some("9984")).await.expect("count"), 1);
    assert_eq!(db.count_price_rows(Some("1301")).await.expect("count"), 0);

    let full = importer(&db, &client).run(RunMode::Live).await.expect("full run");
    assert_eq!(full.rows_written, 1); // 1301 inserted, 9984 already stored
    assert_eq!(db.count_price_rows(None).await.expect("count"), 2);
}
