// Initialization utilities for the CLI
//
// Storage backend and logging/tracing setup

use anyhow::{Context, Result};
use parqstream_codec::ParquetStore;
use parqstream_config::{LogFormat, RuntimeConfig};
use parqstream_partition::{PartitionWriter, RowCountCache};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Everything a command needs: the storage root, the codec over it and the
/// partition writer (which owns the locator and the row-count cache).
pub struct Storage {
    pub root: PathBuf,
    pub store: Arc<ParquetStore>,
    pub writer: PartitionWriter,
}

/// Build the filesystem store and partition writer from RuntimeConfig
pub fn init_storage(config: &RuntimeConfig) -> Result<Storage> {
    let root = PathBuf::from(&config.storage.path);
    std::fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create storage directory: {}", root.display()))?;
    // Absolute so view statements stay valid from any working directory
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve storage directory: {}", root.display()))?;

    let root_str = root.to_string_lossy();
    info!(
        "Using filesystem storage at: {} (max {} rows per file, {} compression)",
        root_str, config.partition.max_rows_per_file, config.parquet.compression
    );

    let store = Arc::new(
        ParquetStore::new_fs(&root_str, &config.parquet)
            .context("Failed to create filesystem operator")?,
    );
    let writer = PartitionWriter::new(
        store.clone(),
        Arc::new(RowCountCache::new()),
        &config.partition,
    )
    .context("Invalid partition configuration")?;

    Ok(Storage {
        root,
        store,
        writer,
    })
}

/// Initialize tracing/logging from RuntimeConfig
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match config.log.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
    };
}
