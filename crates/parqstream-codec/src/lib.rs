// Storage codec for parqstream
//
// Turns schema-free JSON records into Arrow batches and persists them as
// Parquet files through OpenDAL. The partition manager only sees the
// `StorageCodec` trait; everything about column typing, schema widening and
// compression lives here.

pub mod encoding;
pub mod error;
pub mod normalize;
pub mod schema;
pub mod store;

pub use encoding::{encode_batch, writer_properties};
pub use error::{CodecError, Result};
pub use normalize::{
    date_to_days, days_to_date, metadata_fields, records_to_batch, RecordContext,
    DATA_DATE_FIELD, DATA_TYPE_FIELD, INGESTED_AT_FIELD, RECORD_ID_FIELD,
};
pub use schema::{append_batches, merge_schemas, widen_type};
pub use store::{FileStats, ParquetStore, StorageCodec, WriteOutcome};

// Re-export for downstream crates that build batches or operators directly
pub use arrow::array::RecordBatch;
pub use opendal::Operator;
