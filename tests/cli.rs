// End-to-end command tests over a temporary filesystem store

use chrono::NaiveDate;
use parqstream::commands::{self, IngestRequest};
use parqstream::input::parse_records;
use parqstream::{init_storage, RuntimeConfig, Storage};
use serde_json::json;
use tempfile::TempDir;

fn storage_in(dir: &TempDir, max_rows: usize) -> Storage {
    let config = RuntimeConfig::from_toml_str(&format!(
        r#"
[storage]
path = "{}"

[partition]
max_rows_per_file = {}
default_type = "default"

[parquet]
compression = "snappy"
"#,
        dir.path().join("data").display(),
        max_rows
    ))
    .unwrap();
    config.validate().unwrap();
    init_storage(&config).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, d).unwrap()
}

fn request(count: usize, data_type: &str, date: NaiveDate, chunk_size: usize) -> IngestRequest {
    IngestRequest {
        records: (0..count).map(|i| json!({"seq": i, "ok": true})).collect(),
        data_type: Some(data_type.to_string()),
        data_date: Some(date),
        chunk_size,
    }
}

#[tokio::test]
async fn ingest_rotates_and_files_resolves_by_range() {
    let dir = TempDir::new().unwrap();
    let storage = storage_in(&dir, 100);

    let first = commands::ingest(&storage, request(70, "Sensor Data", day(1), 10_000))
        .await
        .unwrap();
    assert_eq!(first.records_processed, 70);
    assert_eq!(first.appends.len(), 1);
    assert_eq!(first.appends[0].file_path, "2024/10/sensor_data_01_31.parquet");

    let second = commands::ingest(&storage, request(50, "sensor_data", day(3), 10_000))
        .await
        .unwrap();
    assert_eq!(second.records_processed, 50);
    let outcome = &second.appends[0];
    assert_eq!(outcome.rotations.len(), 1);
    assert_eq!(
        outcome.rotations[0].closed_path,
        "2024/10/sensor_data_01_03.parquet"
    );
    assert_eq!(outcome.rotations[0].closed_rows, 100);
    assert_eq!(outcome.file_path, "2024/10/sensor_data_03_31.parquet");
    assert_eq!(outcome.row_count, 20);

    let early = commands::files(&storage, Some("  SENSOR DATA "), day(1), day(2))
        .await
        .unwrap();
    assert_eq!(early.paths(), vec!["2024/10/sensor_data_01_03.parquet"]);

    let later = commands::files(&storage, Some("sensor_data"), day(3), day(3))
        .await
        .unwrap();
    assert_eq!(later.len(), 2);

    let sql = later.view_sql("sensors", &storage.root).unwrap();
    assert!(sql.starts_with("CREATE OR REPLACE VIEW sensors AS"));
    assert!(sql.contains("sensor_data_03_31.parquet"));
}

#[tokio::test]
async fn ingest_chunks_large_inputs() {
    let dir = TempDir::new().unwrap();
    let storage = storage_in(&dir, 1_000);

    let summary = commands::ingest(&storage, request(25, "events", day(5), 10))
        .await
        .unwrap();
    assert_eq!(summary.records_processed, 25);
    let sizes: Vec<usize> = summary.appends.iter().map(|a| a.rows_appended).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(summary.appends.last().unwrap().row_count, 25);
}

#[tokio::test]
async fn empty_ingest_is_rejected_without_writing() {
    let dir = TempDir::new().unwrap();
    let storage = storage_in(&dir, 100);

    let err = commands::ingest(&storage, request(0, "events", day(5), 10))
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("E001"));

    let stats = commands::stats(&storage, None).await.unwrap();
    assert_eq!(stats.total_files, 0);
}

#[tokio::test]
async fn stats_sums_rows_per_type() {
    let dir = TempDir::new().unwrap();
    let storage = storage_in(&dir, 100);

    commands::ingest(&storage, request(30, "alpha", day(2), 10_000))
        .await
        .unwrap();
    commands::ingest(&storage, request(12, "beta", day(20), 10_000))
        .await
        .unwrap();

    let all = commands::stats(&storage, None).await.unwrap();
    assert_eq!(all.total_files, 2);
    assert_eq!(all.total_rows, 42);
    assert!(all.total_bytes > 0);

    let beta = commands::stats(&storage, Some("BETA")).await.unwrap();
    assert_eq!(beta.total_files, 1);
    assert_eq!(beta.files[0].path, "2024/10/beta_01_31.parquet");
    assert_eq!(beta.files[0].row_count, 12);
    assert!(beta.files[0].columns.iter().any(|c| c == "seq"));
}

#[tokio::test]
async fn jsonl_input_flows_through_ingest() {
    let dir = TempDir::new().unwrap();
    let storage = storage_in(&dir, 100);

    let (_, records) = parse_records("{\"v\":1}\n{\"v\":2}\n{\"v\":3}\n").unwrap();
    let summary = commands::ingest(
        &storage,
        IngestRequest {
            records,
            data_type: None,
            data_date: Some(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()),
            chunk_size: commands::DEFAULT_CHUNK_SIZE,
        },
    )
    .await
    .unwrap();

    assert_eq!(summary.appends[0].file_path, "2024/02/default_01_29.parquet");
    assert!(storage
        .root
        .join("2024/02/default_01_29.parquet")
        .is_file());
}
