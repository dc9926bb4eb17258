mod common;

use chrono::NaiveDate;
use common::*;
use parqstream_partition::{FileLocator, PartitionError, ValidationError};
use std::sync::Arc;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

#[tokio::test]
async fn resolution_matches_every_intersecting_file() {
    let h = harness(10);
    for (day, rows) in [(1, 6), (3, 9), (3, 4), (8, 15), (15, 2), (21, 12), (30, 3)] {
        h.writer.append(&records(rows), Some("web"), Some(oct(day))).await.unwrap();
    }
    let locator = h.writer.locator();
    let all = locator.list_all(Some("web")).await.unwrap();
    assert!(all.len() > 3);

    for lo in 1..=31 {
        for hi in lo..=31 {
            let expected: Vec<String> = all
                .files()
                .iter()
                .filter(|file| file.overlaps(lo, hi))
                .map(|file| file.path())
                .collect();
            let resolved = locator.resolve_files(Some("web"), oct(lo), oct(hi)).await.unwrap();
            assert_eq!(resolved.paths(), expected, "range {}..={}", lo, hi);
        }
    }
}

#[tokio::test]
async fn ranges_spanning_months_and_years_are_chronological() {
    let h = harness(100);
    for d in [date(2024, 12, 30), date(2025, 1, 2), date(2025, 2, 10), date(2025, 3, 1)] {
        h.writer.append(&records(2), Some("t"), Some(d)).await.unwrap();
    }

    let files = h
        .writer
        .locator()
        .resolve_files(Some("t"), date(2024, 12, 31), date(2025, 2, 9))
        .await
        .unwrap();
    assert_eq!(
        files.paths(),
        vec![
            "2024/12/t_30_31.parquet",
            "2025/01/t_02_31.parquet",
        ]
    );
}

#[tokio::test]
async fn type_filter_is_normalized_and_optional() {
    let h = harness(100);
    h.writer.append(&records(1), Some("api_logs"), Some(oct(4))).await.unwrap();
    h.writer.append(&records(1), Some("metrics"), Some(oct(4))).await.unwrap();

    let locator = h.writer.locator();
    let files = locator.resolve_files(Some("API Logs"), oct(1), oct(31)).await.unwrap();
    assert_eq!(files.paths(), vec!["2025/10/api_logs_04_31.parquet"]);

    let files = locator.resolve_files(None, oct(1), oct(31)).await.unwrap();
    assert_eq!(files.len(), 2);
}

#[tokio::test]
async fn no_data_is_an_empty_result() {
    let h = harness(100);
    let files = h
        .writer
        .locator()
        .resolve_files(Some("t"), date(2030, 1, 1), date(2030, 6, 30))
        .await
        .unwrap();
    assert!(files.is_empty());
    assert_eq!(files.view_sql("all_records", h.dir.path()), None);
}

#[tokio::test]
async fn stray_files_are_ignored() {
    let h = harness(100);
    h.writer.append(&records(1), Some("t"), Some(oct(4))).await.unwrap();

    let month_dir = h.dir.path().join("2025").join("10");
    std::fs::write(month_dir.join("README.txt"), b"notes").unwrap();
    std::fs::write(month_dir.join("t_31_01.parquet"), b"bogus").unwrap();
    std::fs::create_dir_all(month_dir.join("t_01_02.parquet")).unwrap();

    let locator = FileLocator::new(h.store.clone());
    let files = locator.resolve_files(None, oct(1), oct(31)).await.unwrap();
    assert_eq!(files.paths(), vec!["2025/10/t_04_31.parquet"]);
}

#[tokio::test]
async fn reversed_range_is_rejected() {
    let h = harness(100);
    let err = h
        .writer
        .locator()
        .resolve_files(None, oct(5), oct(4))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PartitionError::Validation(ValidationError::InvalidDateRange { .. })
    ));
}

#[tokio::test]
async fn view_statement_covers_resolved_files() {
    let h = harness(100);
    h.writer.append(&records(1), Some("t"), Some(oct(4))).await.unwrap();

    let store: Arc<dyn parqstream_codec::StorageCodec> = h.store.clone();
    let files = FileLocator::new(store)
        .resolve_files(Some("t"), oct(1), oct(31))
        .await
        .unwrap();
    let sql = files.view_sql("all_records", h.dir.path()).unwrap();
    let expected = h.dir.path().join("2025/10/t_04_31.parquet");
    assert!(sql.contains(&expected.to_string_lossy().replace('\\', "/")));
    assert!(sql.contains("union_by_name = true"));
}
