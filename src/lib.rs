// parqstream - JSON records into date- and type-partitioned Parquet files
//
// The binary is a thin shell over these modules:
// - `init`: tracing and storage setup from RuntimeConfig
// - `input`: JSON array / object / JSONL parsing
// - `commands`: ingest, file resolution and statistics

pub mod commands;
pub mod input;
mod init;

pub use init::{init_storage, init_tracing, Storage};
pub use parqstream_config::RuntimeConfig;
