// Partition writer
//
// Routes a batch to the open file of its (type, year, month), appends it and
// rotates when the file reaches `max_rows_per_file`: the full file is renamed
// to its true day range and a successor is opened at the triggering day.
// Batches that cross the capacity boundary are split, so every closed file
// holds exactly `max_rows_per_file` rows. Each storage step of an append is
// journaled; a failure undoes the journal so a batch is stored whole or not
// at all.

use arrow::array::RecordBatch;
use chrono::{Datelike, NaiveDate, Utc};
use parqstream_codec::{
    days_to_date, records_to_batch, CodecError, RecordContext, StorageCodec, WriteOutcome,
    DATA_DATE_FIELD,
};
use parqstream_config::PartitionConfig;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{PartitionError, Result, ValidationError};
use crate::layout::{normalize_type, validate_date, PartitionFile, PartitionKey, DEFAULT_TYPE};
use crate::locator::{split_open, FileLocator};
use crate::locks::PartitionLocks;
use crate::tracker::RowCountTracker;

/// A file closed by rotation and the successor opened in its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rotation {
    /// Path the full file had while open
    pub previous_path: String,
    /// Path after the rename to its true day range
    pub closed_path: String,
    pub closed_rows: usize,
    pub opened_path: String,
}

/// Result of one `append` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppendOutcome {
    /// File that received the last rows of the batch
    pub file_path: String,
    pub data_type: String,
    pub data_date: NaiveDate,
    pub rows_appended: usize,
    /// Rows in `file_path` after the append
    pub row_count: usize,
    /// Size of `file_path` in bytes
    pub file_size: u64,
    pub rotations: Vec<Rotation>,
}

#[derive(Debug, Clone)]
struct OpenFile {
    file: PartitionFile,
    rows: usize,
    exists: bool,
}

/// How to undo one storage step of an append, applied newest first.
#[derive(Debug)]
enum Undo {
    /// Put back the contents an existing file had before the append
    Restore { path: String, contents: Vec<u8> },
    /// Drop a file the append created
    Remove { path: String },
    /// Move a renamed file back from `to` to `from`
    Rename { from: String, to: String },
}

impl Undo {
    fn paths(&self) -> Vec<&str> {
        match self {
            Undo::Restore { path, .. } | Undo::Remove { path } => vec![path.as_str()],
            Undo::Rename { from, to } => vec![from.as_str(), to.as_str()],
        }
    }
}

/// Appends JSON records to time-partitioned Parquet files.
///
/// One writer per process. Appends to the same (type, year, month) are
/// serialized; different partitions proceed in parallel.
pub struct PartitionWriter {
    codec: Arc<dyn StorageCodec>,
    locator: FileLocator,
    tracker: Arc<dyn RowCountTracker>,
    locks: PartitionLocks,
    max_rows_per_file: usize,
    default_type: String,
}

impl PartitionWriter {
    pub fn new(
        codec: Arc<dyn StorageCodec>,
        tracker: Arc<dyn RowCountTracker>,
        config: &PartitionConfig,
    ) -> Result<Self> {
        let default_type = normalize_type(&config.default_type, DEFAULT_TYPE)?;
        let locator = FileLocator::new(Arc::clone(&codec)).with_default_type(default_type.clone());

        Ok(Self {
            codec,
            locator,
            tracker,
            locks: PartitionLocks::new(),
            max_rows_per_file: config.max_rows_per_file.max(1),
            default_type,
        })
    }

    pub fn locator(&self) -> &FileLocator {
        &self.locator
    }

    pub fn tracker(&self) -> &Arc<dyn RowCountTracker> {
        &self.tracker
    }

    pub fn max_rows_per_file(&self) -> usize {
        self.max_rows_per_file
    }

    /// Append `records` for `data_type` on `date`.
    ///
    /// `data_type` defaults to the configured default type and `date` to the
    /// current UTC date. Validation happens before any I/O.
    pub async fn append(
        &self,
        records: &[Value],
        data_type: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<AppendOutcome> {
        if records.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        let data_type = normalize_type(data_type.unwrap_or_default(), &self.default_type)?;
        let date = validate_date(date.unwrap_or_else(|| Utc::now().date_naive()))?;

        let ctx = RecordContext {
            data_type: data_type.clone(),
            data_date: date,
            ingested_at: Utc::now(),
        };
        let batch = records_to_batch(records, &ctx).map_err(|e| match e {
            CodecError::InvalidRecord { index, reason } => {
                PartitionError::from(ValidationError::InvalidRecord { index, reason })
            }
            other => PartitionError::io("failed to build record batch", other),
        })?;

        let key = PartitionKey::for_date(data_type.clone(), date);
        let _guard = self.locks.acquire(&key).await;
        debug!(partition = %key, rows = batch.num_rows(), "Acquired partition lock");

        let outcome = self.append_locked(&key, date, batch).await?;
        info!(
            file = %outcome.file_path,
            data_type = %outcome.data_type,
            data_date = %outcome.data_date,
            rows = outcome.rows_appended,
            rotations = outcome.rotations.len(),
            "Appended records"
        );
        Ok(outcome)
    }

    /// Apply the batch, undoing every storage step if any of them fails so
    /// that a batch is stored whole or not at all.
    async fn append_locked(
        &self,
        key: &PartitionKey,
        date: NaiveDate,
        batch: RecordBatch,
    ) -> Result<AppendOutcome> {
        let mut journal = Vec::new();
        let err = match self.apply(key, date, &batch, &mut journal).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) => err,
        };
        if journal.is_empty() {
            return Err(err);
        }

        match self.rollback(journal).await {
            Ok(()) => {
                warn!(partition = %key, error = %err, "Append failed, storage rolled back");
                Err(err)
            }
            Err(rollback_err) => {
                error!(
                    partition = %key,
                    error = %err,
                    rollback_error = %rollback_err,
                    "Append failed and could not be rolled back"
                );
                Err(rollback_err)
            }
        }
    }

    async fn apply(
        &self,
        key: &PartitionKey,
        date: NaiveDate,
        batch: &RecordBatch,
        journal: &mut Vec<Undo>,
    ) -> Result<AppendOutcome> {
        let (mut open, mut day) = self.resolve_open(key, date.day(), journal).await?;
        let mut remaining = batch.clone();
        let mut rotations = Vec::new();
        let mut last_written: Option<(String, WriteOutcome)> = None;

        loop {
            if open.rows >= self.max_rows_per_file {
                let (rotation, successor) = self.rotate(key, &open, day, journal).await?;
                if let Some((path, _)) = last_written.as_mut() {
                    if *path == rotation.previous_path {
                        *path = rotation.closed_path.clone();
                    }
                }
                day = successor.file.from_day;
                rotations.push(rotation);
                open = successor;
                continue;
            }

            if remaining.num_rows() == 0 {
                break;
            }

            let take = remaining
                .num_rows()
                .min(self.max_rows_per_file - open.rows);
            let segment = remaining.slice(0, take);
            remaining = remaining.slice(take, remaining.num_rows() - take);

            let path = open.file.path();
            if !open.exists {
                journal.push(Undo::Remove { path: path.clone() });
            } else if open.rows + take >= self.max_rows_per_file {
                // A rotation follows this write; keep what is needed to undo it
                let contents = self.codec.read_bytes(&path).await.map_err(|e| {
                    PartitionError::io(format!("failed to read '{}'", path), e)
                })?;
                journal.push(Undo::Restore {
                    path: path.clone(),
                    contents,
                });
            }

            let outcome = self.write_segment(&open, &segment).await?;
            open.rows = outcome.row_count;
            open.exists = true;
            last_written = Some((path, outcome));
        }

        // A rotation at the very end leaves the successor unwritten; create it
        // empty so the partition always has exactly one open file
        if !open.exists {
            journal.push(Undo::Remove {
                path: open.file.path(),
            });
            self.write_segment(&open, &batch.slice(0, 0)).await?;
        }

        let Some((file_path, outcome)) = last_written else {
            return Err(ValidationError::EmptyBatch.into());
        };

        Ok(AppendOutcome {
            file_path,
            data_type: key.data_type.clone(),
            data_date: date,
            rows_appended: batch.num_rows(),
            row_count: outcome.row_count,
            file_size: outcome.byte_size,
            rotations,
        })
    }

    /// Find (or plan) the open file and the day rows are placed under.
    ///
    /// Days already covered by closed files are never reopened: a date at or
    /// before the last closed day is placed on that day, so ranges only ever
    /// share the rotation boundary. Rows keep their real `data_date`.
    async fn resolve_open(
        &self,
        key: &PartitionKey,
        day: u32,
        journal: &mut Vec<Undo>,
    ) -> Result<(OpenFile, u32)> {
        let files = self.locator.partition_files(key).await?;
        let (active, closed_through) = split_open(&files, key.last_day());
        let placed = day.max(closed_through);
        if placed != day {
            debug!(
                partition = %key,
                day,
                placed,
                "Date precedes closed files; placing rows on the last closed day"
            );
        }

        let Some(active) = active else {
            let file = PartitionFile::open(key, placed);
            debug!(path = %file.path(), "No open file, creating one");
            let open = OpenFile {
                file,
                rows: 0,
                exists: false,
            };
            return Ok((open, placed));
        };

        let file = if placed < active.from_day {
            self.widen_down(active, placed, journal).await?
        } else {
            active
        };
        let rows = self.row_count(&file.path()).await?;
        let open = OpenFile {
            file,
            rows,
            exists: true,
        };
        Ok((open, placed))
    }

    /// A late date lands in the open file; its name must then start earlier.
    async fn widen_down(
        &self,
        file: PartitionFile,
        day: u32,
        journal: &mut Vec<Undo>,
    ) -> Result<PartitionFile> {
        let path = file.path();
        let widened = file.with_days(day, file.to_day);
        let target = widened.path();

        if self.exists(&target).await? {
            return Err(PartitionError::RotationConflict { path, target });
        }
        self.rename(&path, &target, journal).await?;

        info!(from = %path, to = %target, "Widened open file for late date");
        Ok(widened)
    }

    /// Close the full open file under its true range and plan a successor.
    ///
    /// The successor starts at the later of `day` and the closed file's last
    /// day, so the two files share at most that one day.
    async fn rotate(
        &self,
        key: &PartitionKey,
        open: &OpenFile,
        day: u32,
        journal: &mut Vec<Undo>,
    ) -> Result<(Rotation, OpenFile)> {
        let path = open.file.path();
        let max_date = self
            .codec
            .read_max_column_value(&path, DATA_DATE_FIELD)
            .await
            .map_err(|e| PartitionError::io(format!("failed to read max date of '{}'", path), e))?
            .and_then(days_to_date)
            .filter(|d| d.year() == key.year && d.month() == key.month);

        let to_day = max_date
            .map(|d| d.day())
            .unwrap_or(day)
            .max(open.file.from_day);
        let closed = open.file.with_days(open.file.from_day, to_day);
        let successor = PartitionFile::open(key, day.max(to_day));
        let closed_path = closed.path();
        let successor_path = successor.path();

        if let Some(target) = self
            .taken_rotation_target(&path, &closed_path, &successor_path)
            .await?
        {
            warn!(path = %path, target = %target, "Rotation target exists, re-resolving");
            self.confirm_conflict(key, &path, &closed_path, &successor_path)
                .await?;
        }

        if closed_path != path {
            self.rename(&path, &closed_path, journal).await?;
        }
        self.tracker.seed(&closed_path, open.rows);
        self.tracker.seed(&successor_path, 0);

        info!(
            closed = %closed_path,
            opened = %successor_path,
            rows = open.rows,
            "Rotated partition file"
        );

        let rotation = Rotation {
            previous_path: path,
            closed_path,
            closed_rows: open.rows,
            opened_path: successor_path,
        };
        let successor = OpenFile {
            file: successor,
            rows: 0,
            exists: false,
        };
        Ok((rotation, successor))
    }

    /// The first rotation name that is already in use, if any.
    async fn taken_rotation_target(
        &self,
        path: &str,
        closed_path: &str,
        successor_path: &str,
    ) -> Result<Option<String>> {
        if successor_path == closed_path {
            return Ok(Some(successor_path.to_string()));
        }
        if closed_path != path && self.exists(closed_path).await? {
            return Ok(Some(closed_path.to_string()));
        }
        if successor_path != path && self.exists(successor_path).await? {
            return Ok(Some(successor_path.to_string()));
        }
        Ok(None)
    }

    /// Re-list the partition once; a target still taken is a conflict.
    async fn confirm_conflict(
        &self,
        key: &PartitionKey,
        path: &str,
        closed_path: &str,
        successor_path: &str,
    ) -> Result<()> {
        let listed: Vec<String> = self
            .locator
            .partition_files(key)
            .await?
            .iter()
            .map(PartitionFile::path)
            .collect();
        let taken = |target: &str| target != path && listed.iter().any(|p| p == target);

        let target = if successor_path == closed_path {
            Some(successor_path)
        } else if taken(closed_path) {
            Some(closed_path)
        } else if taken(successor_path) {
            Some(successor_path)
        } else {
            None
        };

        match target {
            Some(target) => Err(PartitionError::RotationConflict {
                path: path.to_string(),
                target: target.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Write one segment, retrying once. The codec write is all-or-nothing,
    /// so a retry never duplicates rows.
    async fn write_segment(&self, open: &OpenFile, segment: &RecordBatch) -> Result<WriteOutcome> {
        let path = open.file.path();
        let outcome = match self.codec.write_rows(&path, segment, open.exists).await {
            Ok(outcome) => outcome,
            Err(first) => {
                warn!(path = %path, error = %first, "Write failed, retrying once");
                self.tracker.invalidate(&path);
                self.codec
                    .write_rows(&path, segment, open.exists)
                    .await
                    .map_err(|e| PartitionError::io(format!("failed to write '{}'", path), e))?
            }
        };

        self.tracker.bump(&path, segment.num_rows());
        if let Some(cached) = self.tracker.get_count(&path) {
            if cached != outcome.row_count {
                warn!(
                    path = %path,
                    cached,
                    actual = outcome.row_count,
                    "Row count cache drifted from file"
                );
            }
        }
        self.tracker.seed(&path, outcome.row_count);
        Ok(outcome)
    }

    async fn rename(&self, from: &str, to: &str, journal: &mut Vec<Undo>) -> Result<()> {
        self.codec
            .rename(from, to)
            .await
            .map_err(|e| PartitionError::io(format!("failed to rename '{}'", from), e))?;
        journal.push(Undo::Rename {
            from: from.to_string(),
            to: to.to_string(),
        });
        self.move_count(from, to);
        Ok(())
    }

    /// Undo the journal newest first. Cached counts of every touched path
    /// are dropped; the next append reads them from the footers.
    async fn rollback(&self, journal: Vec<Undo>) -> Result<()> {
        for step in &journal {
            for path in step.paths() {
                self.tracker.invalidate(path);
            }
        }

        for step in journal.into_iter().rev() {
            debug!(paths = ?step.paths(), "Undoing append step");
            match step {
                Undo::Restore { path, contents } => {
                    self.codec.write_bytes(&path, contents).await.map_err(|e| {
                        PartitionError::rollback(format!("failed to restore '{}'", path), e)
                    })?
                }
                Undo::Remove { path } => self.codec.delete(&path).await.map_err(|e| {
                    PartitionError::rollback(format!("failed to remove '{}'", path), e)
                })?,
                Undo::Rename { from, to } => {
                    self.codec.rename(&to, &from).await.map_err(|e| {
                        PartitionError::rollback(format!("failed to rename '{}' back", to), e)
                    })?
                }
            }
        }
        Ok(())
    }

    async fn row_count(&self, path: &str) -> Result<usize> {
        if let Some(count) = self.tracker.get_count(path) {
            return Ok(count);
        }
        let count = self.codec.read_row_count(path).await.map_err(|e| {
            PartitionError::io(format!("failed to read row count of '{}'", path), e)
        })?;
        self.tracker.seed(path, count);
        Ok(count)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.codec
            .exists(path)
            .await
            .map_err(|e| PartitionError::io(format!("failed to check '{}'", path), e))
    }

    fn move_count(&self, from: &str, to: &str) {
        let count = self.tracker.get_count(from);
        self.tracker.invalidate(from);
        if let Some(count) = count {
            self.tracker.seed(to, count);
        }
    }
}
