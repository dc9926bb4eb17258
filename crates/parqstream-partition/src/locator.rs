// File discovery from directory metadata
//
// Resolution lists `{year}/{month}/` directories and parses file names; it
// never opens a file. The listing is redone on every call so a finished
// rotation becomes visible to the next query without any cache to refresh.

use chrono::{Datelike, NaiveDate};
use parqstream_codec::StorageCodec;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::error::{PartitionError, Result, ValidationError};
use crate::layout::{
    last_day_of_month, month_dir, normalize_type, validate_date, PartitionFile, PartitionKey,
    DEFAULT_TYPE,
};

/// Resolves (type, date range) predicates to partition files.
#[derive(Clone)]
pub struct FileLocator {
    codec: Arc<dyn StorageCodec>,
    default_type: String,
}

impl FileLocator {
    pub fn new(codec: Arc<dyn StorageCodec>) -> Self {
        Self {
            codec,
            default_type: DEFAULT_TYPE.to_string(),
        }
    }

    /// Type used when a filter normalizes to nothing.
    pub fn with_default_type(mut self, default_type: impl Into<String>) -> Self {
        self.default_type = default_type.into();
        self
    }

    /// Files whose day window intersects `[start, end]`, oldest first.
    ///
    /// `data_type` is normalized the same way the writer normalizes it;
    /// `None` matches every type. No matching files is an empty set, not an
    /// error.
    pub async fn resolve_files(
        &self,
        data_type: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FileSet> {
        validate_date(start)?;
        validate_date(end)?;
        if start > end {
            return Err(ValidationError::InvalidDateRange { start, end }.into());
        }
        let data_type = self.normalize_filter(data_type)?;

        let mut files = Vec::new();
        let (mut year, mut month) = (start.year(), start.month());
        while (year, month) <= (end.year(), end.month()) {
            let lo = if (year, month) == (start.year(), start.month()) {
                start.day()
            } else {
                1
            };
            let hi = if (year, month) == (end.year(), end.month()) {
                end.day()
            } else {
                last_day_of_month(year, month)
            };

            for file in self.list_month(year, month).await? {
                let type_matches = data_type
                    .as_deref()
                    .map_or(true, |wanted| file.data_type == wanted);
                if type_matches && file.overlaps(lo, hi) {
                    files.push(file);
                }
            }

            (year, month) = if month == 12 {
                (year + 1, 1)
            } else {
                (year, month + 1)
            };
        }

        sort_chronologically(&mut files);
        tracing::debug!(
            data_type = ?data_type,
            %start,
            %end,
            matched = files.len(),
            "Resolved partition files"
        );
        Ok(FileSet { files })
    }

    /// Every file of one (type, year, month), oldest first.
    pub async fn partition_files(&self, key: &PartitionKey) -> Result<Vec<PartitionFile>> {
        let mut files: Vec<_> = self
            .list_month(key.year, key.month)
            .await?
            .into_iter()
            .filter(|file| file.data_type == key.data_type)
            .collect();
        sort_chronologically(&mut files);
        Ok(files)
    }

    /// The file currently accepting appends for `key`.
    ///
    /// Only an open file still carries the optimistic `to_day` (the month's
    /// last day); among those the greatest `from_day` wins, since a file
    /// closed on the last day keeps that name too.
    pub async fn active_file(&self, key: &PartitionKey) -> Result<Option<PartitionFile>> {
        let files = self.partition_files(key).await?;
        Ok(split_open(&files, key.last_day()).0)
    }

    /// Every partition file under the root, optionally for one type.
    pub async fn list_all(&self, data_type: Option<&str>) -> Result<FileSet> {
        let data_type = self.normalize_filter(data_type)?;
        let paths = self
            .codec
            .list_files("", true)
            .await
            .map_err(|e| PartitionError::io("failed to list storage root", e))?;

        let mut files: Vec<_> = paths
            .iter()
            .filter_map(|path| PartitionFile::parse_path(path))
            .filter(|file| {
                data_type
                    .as_deref()
                    .map_or(true, |wanted| file.data_type == wanted)
            })
            .collect();
        sort_chronologically(&mut files);
        Ok(FileSet { files })
    }

    fn normalize_filter(&self, data_type: Option<&str>) -> Result<Option<String>> {
        data_type
            .map(|raw| normalize_type(raw, &self.default_type))
            .transpose()
            .map_err(PartitionError::from)
    }

    async fn list_month(&self, year: i32, month: u32) -> Result<Vec<PartitionFile>> {
        let dir = month_dir(year, month);
        let paths = match self.codec.list_files(&dir, false).await {
            Ok(paths) => paths,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => {
                return Err(PartitionError::io(format!("failed to list '{}'", dir), e))
            }
        };

        // Only names that belong to this directory count; stray files are skipped
        Ok(paths
            .iter()
            .filter_map(|path| PartitionFile::parse_path(path))
            .filter(|file| file.year == year && file.month == month)
            .collect())
    }
}

/// Open file of a partition and the last day covered by its closed files
/// (0 when nothing is closed yet). `files` must be sorted chronologically.
pub(crate) fn split_open(files: &[PartitionFile], last_day: u32) -> (Option<PartitionFile>, u32) {
    let open = files.iter().rev().find(|file| file.to_day == last_day).cloned();
    let closed_through = files
        .iter()
        .filter(|file| Some(*file) != open.as_ref())
        .map(|file| file.to_day)
        .max()
        .unwrap_or(0);
    (open, closed_through)
}

fn sort_chronologically(files: &mut [PartitionFile]) {
    files.sort_by(|a, b| {
        (a.year, a.month, a.from_day, a.to_day, &a.data_type)
            .cmp(&(b.year, b.month, b.from_day, b.to_day, &b.data_type))
    });
}

/// Ordered result of a locator query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileSet {
    files: Vec<PartitionFile>,
}

impl FileSet {
    pub fn files(&self) -> &[PartitionFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Root-relative paths.
    pub fn paths(&self) -> Vec<String> {
        self.files.iter().map(PartitionFile::path).collect()
    }

    /// Paths joined onto the storage root, with `/` separators.
    pub fn absolute_paths(&self, root: impl AsRef<Path>) -> Vec<String> {
        let root = root.as_ref();
        self.files
            .iter()
            .map(|file| root.join(file.path()).to_string_lossy().replace('\\', "/"))
            .collect()
    }

    /// A view statement for an analytical engine that reads Parquet lists,
    /// or `None` when there is nothing to read.
    ///
    /// Files of one type may carry different column sets after schema
    /// widening, so columns are unioned by name.
    pub fn view_sql(&self, view_name: &str, root: impl AsRef<Path>) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let list = self
            .absolute_paths(root)
            .iter()
            .map(|path| format!("'{}'", path.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "CREATE OR REPLACE VIEW {} AS SELECT * FROM read_parquet([{}], union_by_name = true)",
            view_name, list
        ))
    }
}

impl IntoIterator for FileSet {
    type Item = PartitionFile;
    type IntoIter = std::vec::IntoIter<PartitionFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}
