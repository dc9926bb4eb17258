// parqstream-config - Unified configuration for the partition manager
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from PARQSTREAM_CONFIG env var
// 3. Config file contents from PARQSTREAM_CONFIG_CONTENT env var
// 4. Default config file locations (./config.toml, ./.parqstream.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, MapEnvSource, ENV_PREFIX};

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub partition: PartitionConfig,

    #[serde(default)]
    pub parquet: ParquetConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Where the `{year}/{month}/{type}_{from}_{to}.parquet` tree lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "./data/parquet".to_string(),
        }
    }
}

/// Rotation policy for partition files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub max_rows_per_file: usize,
    pub default_type: String,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_rows_per_file: 100_000,
            default_type: "default".to_string(),
        }
    }
}

/// Parquet encoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParquetConfig {
    pub compression: Compression,
    pub zstd_level: i32,
    pub row_group_size: usize,
}

impl Default for ParquetConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Zstd,
            zstd_level: 3,
            row_group_size: 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Zstd,
    Snappy,
    Uncompressed,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Zstd => write!(f, "zstd"),
            Compression::Snappy => write!(f, "snappy"),
            Compression::Uncompressed => write!(f, "uncompressed"),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "zstd" => Ok(Compression::Zstd),
            "snappy" | "snap" => Ok(Compression::Snappy),
            "uncompressed" | "none" => Ok(Compression::Uncompressed),
            _ => anyhow::bail!(
                "Unsupported compression: {}. Supported: zstd, snappy, uncompressed",
                s
            ),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Load configuration with graceful fallback to defaults.
    /// Does not fail if config file is missing - uses built-in defaults instead.
    pub fn load_or_default() -> Result<Self> {
        sources::load_or_default()
    }

    /// Parse a TOML document on top of the built-in defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file_config: RuntimeConfig =
            toml::from_str(content).context("Failed to parse config content")?;
        let mut config = RuntimeConfig::default();
        config.merge(file_config);
        Ok(config)
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.storage = other.storage;
        self.partition = other.partition;
        self.parquet = other.parquet;
        self.log = other.log;
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
