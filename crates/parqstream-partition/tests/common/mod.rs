#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use parqstream_codec::{ParquetStore, RecordBatch, StorageCodec, WriteOutcome};
use parqstream_config::{ParquetConfig, PartitionConfig};
use parqstream_partition::{PartitionWriter, RowCountCache, RowCountTracker};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<ParquetStore>,
    pub writer: Arc<PartitionWriter>,
}

pub fn store_at(dir: &TempDir) -> Arc<ParquetStore> {
    let root = dir.path().to_str().unwrap();
    Arc::new(ParquetStore::new_fs(root, &ParquetConfig::default()).unwrap())
}

pub fn partition_config(max_rows: usize) -> PartitionConfig {
    PartitionConfig {
        max_rows_per_file: max_rows,
        default_type: "default".to_string(),
    }
}

pub fn harness(max_rows: usize) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&dir);
    let writer = writer_over(store.clone(), Arc::new(RowCountCache::new()), max_rows);
    Harness { dir, store, writer }
}

pub fn writer_over(
    codec: Arc<dyn StorageCodec>,
    tracker: Arc<dyn RowCountTracker>,
    max_rows: usize,
) -> Arc<PartitionWriter> {
    Arc::new(PartitionWriter::new(codec, tracker, &partition_config(max_rows)).unwrap())
}

pub fn oct(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, day).unwrap()
}

pub fn records(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| json!({"seq": i, "msg": format!("event {}", i)}))
        .collect()
}

/// (file name, row count) for every file of a month, oldest first.
pub async fn month_contents(
    writer: &PartitionWriter,
    store: &ParquetStore,
    data_type: &str,
    year: i32,
    month: u32,
) -> Vec<(String, usize)> {
    let key = parqstream_partition::PartitionKey::new(data_type, year, month);
    let mut out = Vec::new();
    for file in writer.locator().partition_files(&key).await.unwrap() {
        let rows = store.read_row_count(&file.path()).await.unwrap();
        out.push((file.file_name(), rows));
    }
    out
}

/// Codec wrapper that fails selected `write_rows` calls.
pub struct FlakyCodec {
    inner: Arc<ParquetStore>,
    calls: AtomicUsize,
    fail_on: Box<dyn Fn(usize) -> bool + Send + Sync>,
}

impl FlakyCodec {
    pub fn new(
        inner: Arc<ParquetStore>,
        fail_on: impl Fn(usize) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_on: Box::new(fail_on),
        }
    }

    pub fn write_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageCodec for FlakyCodec {
    async fn write_rows(
        &self,
        path: &str,
        batch: &RecordBatch,
        append: bool,
    ) -> parqstream_codec::Result<WriteOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if (self.fail_on)(call) {
            return Err(parqstream_codec::CodecError::storage(
                path,
                opendal::Error::new(opendal::ErrorKind::Unexpected, "injected failure"),
            ));
        }
        self.inner.write_rows(path, batch, append).await
    }

    async fn read_row_count(&self, path: &str) -> parqstream_codec::Result<usize> {
        self.inner.read_row_count(path).await
    }

    async fn read_max_column_value(
        &self,
        path: &str,
        column: &str,
    ) -> parqstream_codec::Result<Option<i64>> {
        self.inner.read_max_column_value(path, column).await
    }

    async fn rename(&self, from: &str, to: &str) -> parqstream_codec::Result<()> {
        self.inner.rename(from, to).await
    }

    async fn exists(&self, path: &str) -> parqstream_codec::Result<bool> {
        self.inner.exists(path).await
    }

    async fn read_bytes(&self, path: &str) -> parqstream_codec::Result<Vec<u8>> {
        self.inner.read_bytes(path).await
    }

    async fn write_bytes(&self, path: &str, contents: Vec<u8>) -> parqstream_codec::Result<()> {
        self.inner.write_bytes(path, contents).await
    }

    async fn delete(&self, path: &str) -> parqstream_codec::Result<()> {
        self.inner.delete(path).await
    }

    async fn list_files(
        &self,
        prefix: &str,
        recursive: bool,
    ) -> parqstream_codec::Result<Vec<String>> {
        self.inner.list_files(prefix, recursive).await
    }
}
