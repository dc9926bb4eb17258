// Partition manager for parqstream
//
// Decides which Parquet file every incoming batch belongs to, rotates files
// when they fill, and resolves date-range queries to the files that may hold
// matching rows using nothing but directory and file names.

pub mod error;
pub mod layout;
pub mod locator;
pub mod locks;
pub mod tracker;
pub mod writer;

pub use error::{ErrorCode, PartitionError, Result, ValidationError};
pub use layout::{
    last_day_of_month, normalize_type, parse_data_date, validate_date, PartitionFile,
    PartitionKey, DEFAULT_TYPE, FILE_EXTENSION, MAX_TYPE_LEN,
};
pub use locator::{FileLocator, FileSet};
pub use locks::PartitionLocks;
pub use tracker::{RowCountCache, RowCountTracker};
pub use writer::{AppendOutcome, PartitionWriter, Rotation};
