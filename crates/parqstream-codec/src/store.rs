//! OpenDAL-backed Parquet storage
//!
//! [`StorageCodec`] is the contract the partition manager relies on: write or
//! append rows to a file, read its row count from the footer, and read the
//! maximum of one column. [`ParquetStore`] implements it over any OpenDAL
//! operator; appends rewrite the whole file under the widened schema.

use arrow::array::{AsArray, RecordBatch};
use arrow::compute::max;
use arrow::datatypes::{
    DataType, Date32Type, Int32Type, Int64Type, TimeUnit, TimestampMicrosecondType,
};
use async_trait::async_trait;
use opendal::Operator;
use parqstream_config::ParquetConfig;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use parquet::file::properties::WriterProperties;
use serde::Serialize;

use crate::encoding::{encode_batch, writer_properties};
use crate::error::{CodecError, Result};
use crate::schema::append_batches;

/// Result of a `write_rows` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    /// Rows in the file after the write
    pub row_count: usize,
    /// Encoded file size in bytes
    pub byte_size: u64,
}

/// Footer-level statistics for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub path: String,
    pub row_count: usize,
    pub byte_size: u64,
    pub columns: Vec<String>,
}

/// Columnar file operations consumed by the partition manager.
///
/// Paths are relative to the store root and use `/` separators.
#[async_trait]
pub trait StorageCodec: Send + Sync {
    /// Create `path` from `batch`, or with `append` merge `batch` into the
    /// existing file. The write is all-or-nothing.
    async fn write_rows(&self, path: &str, batch: &RecordBatch, append: bool)
        -> Result<WriteOutcome>;

    /// Row count from the file footer, without scanning rows.
    async fn read_row_count(&self, path: &str) -> Result<usize>;

    /// Largest value of an integer-like column (Date32 values are days since
    /// the Unix epoch). `None` when the column is absent or all null.
    async fn read_max_column_value(&self, path: &str, column: &str) -> Result<Option<i64>>;

    /// Atomically rename a file, replacing any existing target.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Raw file contents, used to restore a file after a failed multi-step
    /// change.
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>>;

    /// Replace a file with contents captured by `read_bytes`.
    async fn write_bytes(&self, path: &str, contents: Vec<u8>) -> Result<()>;

    /// Remove a file. Removing a missing file succeeds.
    async fn delete(&self, path: &str) -> Result<()>;

    /// File paths under `prefix` (a directory ending in `/`, or empty for
    /// the root). Missing directories yield an empty list.
    async fn list_files(&self, prefix: &str, recursive: bool) -> Result<Vec<String>>;
}

/// Parquet files on an OpenDAL operator.
#[derive(Clone)]
pub struct ParquetStore {
    operator: Operator,
    properties: WriterProperties,
}

impl ParquetStore {
    pub fn new(operator: Operator, config: &ParquetConfig) -> Self {
        Self {
            operator,
            properties: writer_properties(config),
        }
    }

    /// Store rooted at a local directory.
    ///
    /// Writes are staged in `{root}/.staging` and renamed into place, so a
    /// reader never observes a half-written file.
    pub fn new_fs(root: &str, config: &ParquetConfig) -> Result<Self> {
        let staging = format!("{}/.staging", root.trim_end_matches('/'));
        let builder = opendal::services::Fs::default()
            .root(root)
            .atomic_write_dir(&staging);
        let operator = Operator::new(builder)
            .map_err(|e| CodecError::storage(root, e))?
            .finish();

        tracing::debug!(root = %root, "Filesystem store initialized");
        Ok(Self::new(operator, config))
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    async fn read_builder(
        &self,
        path: &str,
    ) -> Result<ParquetRecordBatchReaderBuilder<bytes::Bytes>> {
        let data = self
            .operator
            .read(path)
            .await
            .map_err(|e| CodecError::storage(path, e))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(data.to_bytes())?;
        Ok(builder)
    }

    /// Decode every row of a file.
    pub async fn read_batches(&self, path: &str) -> Result<Vec<RecordBatch>> {
        let reader = self.read_builder(path).await?.build()?;
        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }
        Ok(batches)
    }

    pub async fn file_stats(&self, path: &str) -> Result<FileStats> {
        let meta = self
            .operator
            .stat(path)
            .await
            .map_err(|e| CodecError::storage(path, e))?;
        let builder = self.read_builder(path).await?;
        let row_count = footer_rows(&builder);
        let columns = builder
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect();

        Ok(FileStats {
            path: path.to_string(),
            row_count,
            byte_size: meta.content_length(),
            columns,
        })
    }
}

fn footer_rows(builder: &ParquetRecordBatchReaderBuilder<bytes::Bytes>) -> usize {
    usize::try_from(builder.metadata().file_metadata().num_rows()).unwrap_or(0)
}

#[async_trait]
impl StorageCodec for ParquetStore {
    async fn write_rows(
        &self,
        path: &str,
        batch: &RecordBatch,
        append: bool,
    ) -> Result<WriteOutcome> {
        let merged = if append {
            let builder = self.read_builder(path).await?;
            let existing_schema = builder.schema().clone();
            let mut existing = Vec::new();
            for stored in builder.build()? {
                existing.push(stored?);
            }
            append_batches(&existing_schema, &existing, batch)?
        } else {
            batch.clone()
        };

        let bytes = encode_batch(&merged, &self.properties)?;
        let byte_size = bytes.len() as u64;
        self.operator
            .write(path, bytes)
            .await
            .map_err(|e| CodecError::storage(path, e))?;

        tracing::debug!(
            path = %path,
            rows = batch.num_rows(),
            total_rows = merged.num_rows(),
            byte_size,
            append,
            "Wrote parquet file"
        );

        Ok(WriteOutcome {
            row_count: merged.num_rows(),
            byte_size,
        })
    }

    async fn read_row_count(&self, path: &str) -> Result<usize> {
        let builder = self.read_builder(path).await?;
        Ok(footer_rows(&builder))
    }

    async fn read_max_column_value(&self, path: &str, column: &str) -> Result<Option<i64>> {
        let builder = self.read_builder(path).await?;
        if builder.schema().index_of(column).is_err() {
            return Ok(None);
        }

        let mask = ProjectionMask::columns(builder.parquet_schema(), [column]);
        let reader = builder.with_projection(mask).build()?;

        let mut result: Option<i64> = None;
        for batch in reader {
            let batch = batch?;
            let array = batch.column(0);
            let batch_max = match array.data_type() {
                DataType::Date32 => max(array.as_primitive::<Date32Type>()).map(i64::from),
                DataType::Int32 => max(array.as_primitive::<Int32Type>()).map(i64::from),
                DataType::Int64 => max(array.as_primitive::<Int64Type>()),
                DataType::Timestamp(TimeUnit::Microsecond, _) => {
                    max(array.as_primitive::<TimestampMicrosecondType>())
                }
                other => {
                    return Err(CodecError::Schema(format!(
                        "column '{}' has type {} which has no integer maximum",
                        column, other
                    )))
                }
            };
            result = match (result, batch_max) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }
        Ok(result)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.operator
            .rename(from, to)
            .await
            .map_err(|e| CodecError::storage(from, e))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.operator
            .exists(path)
            .await
            .map_err(|e| CodecError::storage(path, e))
    }

    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let data = self
            .operator
            .read(path)
            .await
            .map_err(|e| CodecError::storage(path, e))?;
        Ok(data.to_vec())
    }

    async fn write_bytes(&self, path: &str, contents: Vec<u8>) -> Result<()> {
        self.operator
            .write(path, contents)
            .await
            .map_err(|e| CodecError::storage(path, e))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.operator
            .delete(path)
            .await
            .map_err(|e| CodecError::storage(path, e))
    }

    async fn list_files(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
        let entries = match self.operator.list_with(prefix).recursive(recursive).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CodecError::storage(prefix, e)),
        };

        Ok(entries
            .into_iter()
            .filter(|entry| entry.metadata().is_file())
            .map(|entry| entry.path().to_string())
            .collect())
    }
}
