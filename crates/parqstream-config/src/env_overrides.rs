use super::{Compression, LogFormat, RuntimeConfig};
use anyhow::{anyhow, Result};
use std::collections::HashMap;

pub const ENV_PREFIX: &str = "PARQSTREAM_";

/// Abstraction over environment-variable lookups so tests (and embedders)
/// can supply their own source of overrides.
pub trait EnvSource {
    /// Look up `key` with the `PARQSTREAM_` prefix applied.
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory `EnvSource`; keys are given without the prefix.
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Storage
    if let Some(path) = get_env_string(env, "STORAGE_PATH") {
        config.storage.path = path;
    }

    // Partition rotation
    if let Some(val) = get_env_usize(env, "MAX_ROWS_PER_FILE")? {
        config.partition.max_rows_per_file = val;
    }
    if let Some(data_type) = get_env_string(env, "DEFAULT_TYPE") {
        config.partition.default_type = data_type;
    }

    // Parquet encoding
    if let Some(compression) = get_env_string(env, "COMPRESSION") {
        config.parquet.compression = compression
            .parse::<Compression>()
            .map_err(|e| anyhow!("Invalid {}COMPRESSION value: {}", ENV_PREFIX, e))?;
    }
    if let Some(level) = get_env_string(env, "ZSTD_LEVEL") {
        config.parquet.zstd_level = level
            .parse::<i32>()
            .map_err(|e| anyhow!("Failed to parse {}ZSTD_LEVEL: {}", ENV_PREFIX, e))?;
    }
    if let Some(val) = get_env_usize(env, "ROW_GROUP_SIZE")? {
        config.parquet.row_group_size = val;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.log.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key).filter(|val| !val.is_empty())
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
