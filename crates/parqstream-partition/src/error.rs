//! Error types for the partition manager

use chrono::NaiveDate;
use parqstream_codec::CodecError;
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Input rejected before any I/O
    E001Validation,
    /// E002: Rotation target already taken
    E002RotationConflict,
    /// E003: Storage failed mid-append
    E003IoFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001Validation => "E001",
            Self::E002RotationConflict => "E002",
            Self::E003IoFailure => "E003",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input problems detected before touching storage. Nothing is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record batch is empty")]
    EmptyBatch,

    #[error("record {index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("invalid type '{value}': {reason}")]
    InvalidType { value: String, reason: String },

    #[error("invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

/// Errors surfaced by the writer and locator
#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("[E001] {0}")]
    Validation(#[from] ValidationError),

    /// Another file already holds the name a rotation needed, and it was
    /// still there after re-resolving through the locator
    #[error("[E002] cannot rotate '{path}': target '{target}' already exists")]
    RotationConflict { path: String, target: String },

    /// Storage failure. With `unchanged` the failed batch left nothing
    /// behind: either no write happened or every step was undone. Otherwise
    /// the rollback itself failed and the partition state is unknown.
    #[error("[E003] {message} ({}): {source}", storage_state(.unchanged))]
    Io {
        message: String,
        unchanged: bool,
        #[source]
        source: CodecError,
    },
}

fn storage_state(unchanged: &bool) -> &'static str {
    if *unchanged {
        "storage unchanged"
    } else {
        "storage state unknown"
    }
}

impl PartitionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::E001Validation,
            Self::RotationConflict { .. } => ErrorCode::E002RotationConflict,
            Self::Io { .. } => ErrorCode::E003IoFailure,
        }
    }

    pub(crate) fn io(message: impl Into<String>, source: CodecError) -> Self {
        Self::Io {
            message: message.into(),
            unchanged: true,
            source,
        }
    }

    /// A failure while undoing a partial append.
    pub(crate) fn rollback(message: impl Into<String>, source: CodecError) -> Self {
        Self::Io {
            message: message.into(),
            unchanged: false,
            source,
        }
    }
}

/// Result type alias for PartitionError
pub type Result<T> = std::result::Result<T, PartitionError>;
