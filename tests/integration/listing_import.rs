//! Listing-sheet import integration tests: replace semantics, dry runs
//! and abort-before-write behavior.

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

use portfolio_import::error::ImportError;
use portfolio_import::importer::{stocks, RunMode};

use crate::common::{database, fixtures};

#[test_log::test(tokio::test)]
async fn two_valid_rows_and_a_bad_date_import_two() {
    let db = database::init_test_database().await;
    let sheet = fixtures::write_sheet(&[
        fixtures::sheet_line("20250731", "1301", "極洋"),
        fixtures::sheet_line("2025-07-31", "9999", "壊れた行"),
        fixtures::sheet_line("20250731", "7203", "トヨタ自動車"),
    ]);

    let summary = stocks::run(sheet.path(), Some(&db), RunMode::Live, 500)
        .await
        .expect("live run");

    assert_eq!(summary.rows_read, 3);
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(summary.skip_reasons.get("invalid 日付"), Some(&1));
    assert_eq!(db.count_stocks().await.expect("count"), 2);

    let toyota = db
        .get_stock("7203")
        .await
        .expect("lookup")
        .expect("should exist");
    assert_eq!(toyota.stock_name, "トヨタ自動車");
    assert_eq!(toyota.industry.as_deref(), Some("輸送用機器"));
}

#[test_log::test(tokio::test)]
async fn reimporting_the_same_sheet_is_idempotent() {
    let db = database::init_test_database().await;
    let sheet = fixtures::write_sheet(&[
        fixtures::sheet_line("20250731", "1301", "極洋"),
        fixtures::sheet_line("20250731", "7203", "トヨタ自動車"),
    ]);

    stocks::run(sheet.path(), Some(&db), RunMode::Live, 500)
        .await
        .expect("first run");
    let second = stocks::run(sheet.path(), Some(&db), RunMode::Live, 500)
        .await
        .expect("second run");

    assert_eq!(second.rows_written, 2);
    assert_eq!(db.count_stocks().await.expect("count"), 2);
}

#[test_log::test(tokio::test)]
async fn a_reload_drops_codes_missing_from_the_new_sheet() {
    let db = database::init_test_database().await;
    let full = fixtures::write_sheet(&[
        fixtures::sheet_line("20250630", "1301", "極洋"),
        fixtures::sheet_line("20250630", "9984", "ソフトバンクグループ"),
    ]);
    let trimmed = fixtures::write_sheet(&[fixtures::sheet_line("20250731", "1301", "極洋")]);

    stocks::run(full.path(), Some(&db), RunMode::Live, 500)
        .await
        .expect("first run");
    stocks::run(trimmed.path(), Some(&db), RunMode::Live, 500)
        .await
        .expect("second run");

    assert_eq!(db.count_stocks().await.expect("count"), 1);
    assert!(db.get_stock("9984").await.expect("lookup").is_none());
}

#[test_log::test(tokio::test)]
async fn a_dry_run_never_touches_the_destination() {
    let db = database::init_test_database().await;
    let first = fixtures::write_sheet(&[fixtures::sheet_line("20250630", "1301", "極洋")]);
    let second = fixtures::write_sheet(&[
        fixtures::sheet_line("20250731", "7203", "トヨタ自動車"),
        fixtures::sheet_line("20250731", "9984", "ソフトバンクグループ"),
    ]);

    stocks::run(first.path(), Some(&db), RunMode::Live, 500)
        .await
        .expect("live run");

    // The dry run reads a different sheet; nothing may change, and the
    // controller does not even need the destination handle.
    let summary = stocks::run(second.path(), None, RunMode::DryRun, 500)
        .await
        .expect("dry run");

    assert!(summary.dry_run);
    assert_eq!(summary.rows_read, 2);
    assert_eq!(summary.rows_written, 0);
    assert_eq!(db.count_stocks().await.expect("count"), 1);
    assert!(db.get_stock("1301").await.expect("lookup").is_some());
}

#[test_log::test(tokio::test)]
async fn a_malformed_header_aborts_before_any_write() {
    let db = database::init_test_database().await;
    let good = fixtures::write_sheet(&[fixtures::sheet_line("20250630", "1301", "極洋")]);
    stocks::run(good.path(), Some(&db), RunMode::Live, 500)
        .await
        .expect("seed run");

    let mut bad = NamedTempFile::new().expect("temp file");
    writeln!(bad, "code,name").expect("write header");
    writeln!(bad, "7203,トヨタ自動車").expect("write row");
    bad.flush().expect("flush");

    let err = stocks::run(bad.path(), Some(&db), RunMode::Live, 500)
        .await
        .expect_err("should reject the sheet");

    assert_matches!(err, ImportError::SourceFormat(_));
    assert_eq!(db.count_stocks().await.expect("count"), 1);
}

#[test_log::test(tokio::test)]
async fn a_reload_that_would_orphan_a_holding_rolls_back() {
    let db = database::init_test_database().await;
    let full = fixtures::write_sheet(&[
        fixtures::sheet_line("20250630", "1301", "極洋"),
        fixtures::sheet_line("20250630", "7203", "トヨタ自動車"),
    ]);
    stocks::run(full.path(), Some(&db), RunMode::Live, 500)
        .await
        .expect("first run");
    database::seed_holding(&db, "7203").await;

    // The new sheet no longer lists the held ticker; the swap must fail
    // as a whole and leave the previous listing queryable.
    let trimmed = fixtures::write_sheet(&[fixtures::sheet_line("20250731", "1301", "極洋")]);
    let err = stocks::run(trimmed.path(), Some(&db), RunMode::Live, 500)
        .await
        .expect_err("commit should be rejected");

    assert_matches!(err, ImportError::Write(_));
    assert_eq!(db.count_stocks().await.expect("count"), 2);
    assert!(db.get_stock("7203").await.expect("lookup").is_some());
}
