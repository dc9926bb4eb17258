//! Error types for codec operations.

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

/// Errors raised while normalizing records or reading/writing Parquet files
#[derive(Debug, Error)]
pub enum CodecError {
    /// The storage operator failed (missing file, permissions, disk full)
    #[error("storage operation on '{path}' failed: {source}")]
    Storage {
        path: String,
        #[source]
        source: opendal::Error,
    },

    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// A record could not be turned into a row
    #[error("record {index} rejected: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("schema error: {0}")]
    Schema(String),
}

impl CodecError {
    pub fn storage(path: &str, source: opendal::Error) -> Self {
        Self::Storage {
            path: path.to_string(),
            source,
        }
    }

    /// True when the underlying storage reported a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Storage { source, .. } if source.kind() == opendal::ErrorKind::NotFound
        )
    }
}

/// Result type alias for CodecError
pub type Result<T> = std::result::Result<T, CodecError>;
