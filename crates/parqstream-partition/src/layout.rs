// Partition directory layout
//
// Files live at `{year:04}/{month:02}/{type}_{from:02}_{to:02}.parquet`
// relative to the storage root. The name alone carries everything the locator
// needs: type, month and the inclusive day window of the rows inside.

use chrono::{DateTime, Datelike, NaiveDate};
use serde::Serialize;

use crate::error::ValidationError;

pub const FILE_EXTENSION: &str = "parquet";

/// Sentinel type for records submitted without one
pub const DEFAULT_TYPE: &str = "default";

/// Longest normalized type accepted; keeps file names well under OS limits
pub const MAX_TYPE_LEN: usize = 64;

/// Normalize a free-form type to a filesystem-safe token.
///
/// Lowercases, turns whitespace runs into `_`, drops everything outside
/// `[a-z0-9_-]` and falls back to `default_type` when nothing is left.
pub fn normalize_type(raw: &str, default_type: &str) -> Result<String, ValidationError> {
    let mut token = String::with_capacity(raw.len());
    let mut in_space = false;

    for ch in raw.trim().chars() {
        if ch.is_whitespace() {
            if !in_space {
                token.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        for lower in ch.to_lowercase() {
            if lower.is_ascii_lowercase() || lower.is_ascii_digit() || lower == '_' || lower == '-'
            {
                token.push(lower);
            }
        }
    }

    if token.is_empty() {
        return Ok(default_type.to_string());
    }

    if token.len() > MAX_TYPE_LEN {
        return Err(ValidationError::InvalidType {
            value: raw.to_string(),
            reason: format!(
                "normalized type is {} characters, the limit is {}",
                token.len(),
                MAX_TYPE_LEN
            ),
        });
    }

    Ok(token)
}

fn is_type_token(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_TYPE_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

/// Last calendar day of a month (28 to 31).
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Reject dates whose year would not render as a four-digit directory.
pub fn validate_date(date: NaiveDate) -> Result<NaiveDate, ValidationError> {
    if !(1..=9999).contains(&date.year()) {
        return Err(ValidationError::InvalidDate {
            value: date.to_string(),
            reason: "year must be between 1 and 9999".to_string(),
        });
    }
    Ok(date)
}

/// Parse a `YYYY-MM-DD` date or an RFC 3339 timestamp (its local date is used).
pub fn parse_data_date(value: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = value.trim();
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|ts| ts.date_naive())
        })
        .ok_or_else(|| ValidationError::InvalidDate {
            value: value.to_string(),
            reason: "expected YYYY-MM-DD or an RFC 3339 timestamp".to_string(),
        })?;
    validate_date(date)
}

/// One (type, year, month) partition. Single-writer locks are keyed on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub data_type: String,
    pub year: i32,
    pub month: u32,
}

impl PartitionKey {
    pub fn new(data_type: impl Into<String>, year: i32, month: u32) -> Self {
        Self {
            data_type: data_type.into(),
            year,
            month,
        }
    }

    pub fn for_date(data_type: impl Into<String>, date: NaiveDate) -> Self {
        Self::new(data_type, date.year(), date.month())
    }

    /// Directory holding this month's files, with a trailing `/`.
    pub fn dir(&self) -> String {
        month_dir(self.year, self.month)
    }

    pub fn last_day(&self) -> u32 {
        last_day_of_month(self.year, self.month)
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{:04}-{:02}", self.data_type, self.year, self.month)
    }
}

pub(crate) fn month_dir(year: i32, month: u32) -> String {
    format!("{:04}/{:02}/", year, month)
}

/// A partition file as described by its path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PartitionFile {
    pub data_type: String,
    pub year: i32,
    pub month: u32,
    pub from_day: u32,
    pub to_day: u32,
}

impl PartitionFile {
    /// A fresh open file starting at `from_day`, optimistically running to
    /// the last day of the month.
    pub fn open(key: &PartitionKey, from_day: u32) -> Self {
        Self {
            data_type: key.data_type.clone(),
            year: key.year,
            month: key.month,
            from_day,
            to_day: key.last_day(),
        }
    }

    pub fn key(&self) -> PartitionKey {
        PartitionKey::new(self.data_type.clone(), self.year, self.month)
    }

    pub fn with_days(&self, from_day: u32, to_day: u32) -> Self {
        Self {
            from_day,
            to_day,
            ..self.clone()
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{:02}_{:02}.{}",
            self.data_type, self.from_day, self.to_day, FILE_EXTENSION
        )
    }

    /// Path relative to the storage root.
    pub fn path(&self) -> String {
        format!("{}{}", month_dir(self.year, self.month), self.file_name())
    }

    /// True when `[from_day, to_day]` intersects `[lo, hi]`.
    pub fn overlaps(&self, lo: u32, hi: u32) -> bool {
        self.from_day <= hi && self.to_day >= lo
    }

    /// Parse a root-relative path such as `2025/10/api_logs_01_31.parquet`.
    ///
    /// Anything that does not follow the layout exactly yields `None`.
    pub fn parse_path(path: &str) -> Option<Self> {
        let mut parts = path.trim_start_matches('/').splitn(3, '/');
        let year = parts.next()?;
        let month = parts.next()?;
        let name = parts.next()?;

        if year.len() != 4 || month.len() != 2 || name.contains('/') {
            return None;
        }
        let year: i32 = parse_digits(year)?;
        let month: u32 = parse_digits(month)?;
        Self::parse_file_name(name, year, month)
    }

    /// Parse `{type}_{from}_{to}.parquet` for a known year and month.
    ///
    /// Types may contain `_`, so the day fields are split from the right.
    pub fn parse_file_name(name: &str, year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) {
            return None;
        }
        let stem = name.strip_suffix(FILE_EXTENSION)?.strip_suffix('.')?;

        let mut fields = stem.rsplitn(3, '_');
        let to_field = fields.next()?;
        let from_field = fields.next()?;
        let data_type = fields.next()?;

        if to_field.len() != 2 || from_field.len() != 2 || !is_type_token(data_type) {
            return None;
        }
        let from_day: u32 = parse_digits(from_field)?;
        let to_day: u32 = parse_digits(to_field)?;
        if from_day == 0 || from_day > to_day || to_day > last_day_of_month(year, month) {
            return None;
        }

        Some(Self {
            data_type: data_type.to_string(),
            year,
            month,
            from_day,
            to_day,
        })
    }
}

fn parse_digits<T: std::str::FromStr>(value: &str) -> Option<T> {
    if value.bytes().all(|b| b.is_ascii_digit()) {
        value.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_normalization_is_deterministic() {
        assert_eq!(normalize_type("API Logs!", DEFAULT_TYPE).unwrap(), "api_logs");
        assert_eq!(normalize_type("api_logs", DEFAULT_TYPE).unwrap(), "api_logs");
        assert_eq!(normalize_type("  Web   Events ", DEFAULT_TYPE).unwrap(), "web_events");
        assert_eq!(normalize_type("sensor-42", DEFAULT_TYPE).unwrap(), "sensor-42");
        assert_eq!(normalize_type("../etc/passwd", DEFAULT_TYPE).unwrap(), "etcpasswd");
    }

    #[test]
    fn blank_types_fall_back_to_sentinel() {
        assert_eq!(normalize_type("", DEFAULT_TYPE).unwrap(), "default");
        assert_eq!(normalize_type("   \t ", DEFAULT_TYPE).unwrap(), "default");
        assert_eq!(normalize_type("!!!", DEFAULT_TYPE).unwrap(), "default");
    }

    #[test]
    fn overlong_types_are_rejected() {
        let raw = "x".repeat(MAX_TYPE_LEN + 1);
        assert!(matches!(
            normalize_type(&raw, DEFAULT_TYPE),
            Err(ValidationError::InvalidType { .. })
        ));
    }

    #[test]
    fn month_lengths() {
        assert_eq!(last_day_of_month(2024, 2), 29);
        assert_eq!(last_day_of_month(2023, 2), 28);
        assert_eq!(last_day_of_month(2025, 4), 30);
        assert_eq!(last_day_of_month(2025, 12), 31);
    }

    #[test]
    fn february_open_file_clamps_to_day_29() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        let key = PartitionKey::for_date("events", date);
        let file = PartitionFile::open(&key, 15);
        assert_eq!(file.path(), "2024/02/events_15_29.parquet");
    }

    #[test]
    fn names_round_trip_through_the_parser() {
        let file = PartitionFile {
            data_type: "api_logs".into(),
            year: 2025,
            month: 10,
            from_day: 1,
            to_day: 3,
        };
        assert_eq!(file.path(), "2025/10/api_logs_01_03.parquet");
        assert_eq!(PartitionFile::parse_path(&file.path()), Some(file));
    }

    #[test]
    fn malformed_names_are_ignored() {
        for path in [
            "2025/10/notes.txt",
            "2025/10/_01_31.parquet",
            "2025/10/x_1_31.parquet",
            "2025/10/x_05_03.parquet",
            "2025/02/x_01_30.parquet",
            "2025/13/x_01_31.parquet",
            "25/10/x_01_31.parquet",
            "2025/10/Caps_01_31.parquet",
            ".staging/2025/10/x_01_31.parquet",
        ] {
            assert_eq!(PartitionFile::parse_path(path), None, "{}", path);
        }
    }

    #[test]
    fn date_inputs() {
        let expected = NaiveDate::from_ymd_opt(2025, 10, 3).unwrap();
        assert_eq!(parse_data_date("2025-10-03").unwrap(), expected);
        assert_eq!(parse_data_date("2025-10-03T23:59:00Z").unwrap(), expected);
        assert_eq!(parse_data_date("2025-10-03T01:00:00+09:00").unwrap(), expected);
        assert!(matches!(
            parse_data_date("03/10/2025"),
            Err(ValidationError::InvalidDate { .. })
        ));
        assert!(parse_data_date("2025-02-30").is_err());
    }
}
