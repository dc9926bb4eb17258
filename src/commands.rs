// Command implementations shared by the CLI and integration tests

use anyhow::{Context, Result};
use chrono::NaiveDate;
use parqstream_codec::FileStats;
use parqstream_partition::{AppendOutcome, FileSet};
use serde::Serialize;
use serde_json::Value;

use crate::init::Storage;

/// Records per append when ingesting large inputs
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub records: Vec<Value>,
    pub data_type: Option<String>,
    pub data_date: Option<NaiveDate>,
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub records_processed: usize,
    pub appends: Vec<AppendOutcome>,
}

/// Append records in chunks; each chunk is one atomic append.
///
/// A failed chunk stops the ingest. Earlier chunks stay committed and the
/// error says how many records made it.
pub async fn ingest(storage: &Storage, request: IngestRequest) -> Result<IngestSummary> {
    let chunk_size = request.chunk_size.max(1);
    let mut appends = Vec::new();
    let mut records_processed = 0;

    for chunk in request.records.chunks(chunk_size) {
        let outcome = storage
            .writer
            .append(chunk, request.data_type.as_deref(), request.data_date)
            .await
            .with_context(|| {
                format!(
                    "Ingest stopped after {} of {} records",
                    records_processed,
                    request.records.len()
                )
            })?;
        records_processed += outcome.rows_appended;
        appends.push(outcome);
    }

    if appends.is_empty() {
        // Surface the writer's empty-batch validation error
        storage
            .writer
            .append(&[], request.data_type.as_deref(), request.data_date)
            .await?;
    }

    Ok(IngestSummary {
        records_processed,
        appends,
    })
}

/// Files for a type and date range, resolved from names only.
pub async fn files(
    storage: &Storage,
    data_type: Option<&str>,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<FileSet> {
    let files = storage
        .writer
        .locator()
        .resolve_files(data_type, from, to)
        .await?;
    Ok(files)
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub total_files: usize,
    pub total_rows: usize,
    pub total_bytes: u64,
    pub files: Vec<FileStats>,
}

/// Footer statistics for every partition file.
pub async fn stats(storage: &Storage, data_type: Option<&str>) -> Result<StatsReport> {
    let set = storage.writer.locator().list_all(data_type).await?;

    let mut files = Vec::with_capacity(set.len());
    for path in set.paths() {
        let stats = storage
            .store
            .file_stats(&path)
            .await
            .with_context(|| format!("Failed to read statistics for {}", path))?;
        files.push(stats);
    }

    Ok(StatsReport {
        total_files: files.len(),
        total_rows: files.iter().map(|f| f.row_count).sum(),
        total_bytes: files.iter().map(|f| f.byte_size).sum(),
        files,
    })
}
