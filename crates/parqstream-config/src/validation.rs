// Configuration validation
//
// Validates that required fields are present and values are sensible

use super::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_storage_config(&config.storage)?;
    validate_partition_config(&config.partition)?;
    validate_parquet_config(&config.parquet)?;
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    if config.path.trim().is_empty() {
        bail!(
            "Storage path is required\n\n\
            How to fix:\n\
              • Environment: export {}STORAGE_PATH=/data/parquet\n\
              • TOML: [storage]\n          path = \"/data/parquet\"",
            ENV_PREFIX
        );
    }

    Ok(())
}

fn validate_partition_config(config: &PartitionConfig) -> Result<()> {
    if config.max_rows_per_file == 0 {
        bail!("partition.max_rows_per_file must be greater than 0");
    }

    // Every append rewrites the whole open file, so huge files get slow
    if config.max_rows_per_file > 10_000_000 {
        warn!(
            max_rows_per_file = config.max_rows_per_file,
            "partition.max_rows_per_file is very large; appends rewrite the open file"
        );
    }

    Ok(())
}

fn validate_parquet_config(config: &ParquetConfig) -> Result<()> {
    if config.row_group_size == 0 {
        bail!("parquet.row_group_size must be greater than 0");
    }

    if config.compression == Compression::Zstd && !(1..=22).contains(&config.zstd_level) {
        bail!(
            "parquet.zstd_level must be between 1 and 22 (got {})",
            config.zstd_level
        );
    }

    if config.row_group_size > 1_000_000 {
        warn!(
            row_group_size = config.row_group_size,
            "parquet.row_group_size is very large; may cause memory issues"
        );
    }

    Ok(())
}
