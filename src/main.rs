use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use parqstream::commands::{self, IngestRequest, DEFAULT_CHUNK_SIZE};
use parqstream::input::parse_records;
use parqstream::RuntimeConfig;
use parqstream_partition::parse_data_date;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;

/// Persist JSON records into date- and type-partitioned Parquet files
#[derive(Parser)]
#[command(name = "parqstream")]
#[command(version)]
#[command(about = "Persist JSON records into date- and type-partitioned Parquet files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Root directory of the partition tree (overrides config file)
    #[arg(short, long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Rows per file before rotation (overrides config file)
    #[arg(long, value_name = "ROWS", global = true)]
    max_rows: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Append records from a JSON array, JSON object or JSONL file
    Ingest {
        /// Input file, or `-` for stdin
        input: PathBuf,

        /// Data type of the records (normalized; defaults to the configured type)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        data_type: Option<String>,

        /// Data date, YYYY-MM-DD or RFC 3339 (defaults to today, UTC)
        #[arg(long, value_name = "DATE", value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        /// Records per append
        #[arg(long, value_name = "N", default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// List the files that may hold rows for a type and date range
    Files {
        /// First date of the range (inclusive)
        #[arg(long, value_name = "DATE", value_parser = parse_date_arg)]
        from: NaiveDate,

        /// Last date of the range (inclusive)
        #[arg(long, value_name = "DATE", value_parser = parse_date_arg)]
        to: NaiveDate,

        /// Only files of this type
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        data_type: Option<String>,

        /// Print a CREATE VIEW statement instead of paths
        #[arg(long)]
        sql: bool,

        /// View name for --sql
        #[arg(long, value_name = "NAME", default_value = "all_records")]
        view: String,
    },
    /// Row counts, sizes and columns of every partition file
    Stats {
        /// Only files of this type
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        data_type: Option<String>,
    },
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_data_date(value).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Step 1: Load base configuration
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load_or_default().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli);
    config.validate()?;

    // Step 3: Initialize tracing and storage
    parqstream::init_tracing(&config);
    let storage = parqstream::init_storage(&config)?;

    match cli.command {
        Commands::Ingest {
            input,
            data_type,
            date,
            chunk_size,
        } => {
            let content = read_input(&input)?;
            let (format, records) = parse_records(&content)
                .with_context(|| format!("Failed to parse {}", input.display()))?;
            tracing::debug!(?format, records = records.len(), "Parsed input");

            let summary = commands::ingest(
                &storage,
                IngestRequest {
                    records,
                    data_type,
                    data_date: date,
                    chunk_size,
                },
            )
            .await?;
            print_json(&summary)
        }
        Commands::Files {
            from,
            to,
            data_type,
            sql,
            view,
        } => {
            let files = commands::files(&storage, data_type.as_deref(), from, to).await?;
            if sql {
                match files.view_sql(&view, &storage.root) {
                    Some(statement) => println!("{}", statement),
                    None => tracing::warn!("No Parquet files found for the requested range"),
                }
            } else {
                for path in files.absolute_paths(&storage.root) {
                    println!("{}", path);
                }
            }
            Ok(())
        }
        Commands::Stats { data_type } => {
            let report = commands::stats(&storage, data_type.as_deref()).await?;
            print_json(&report)
        }
    }
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(dir) = &cli.data_dir {
        config.storage.path = dir.to_string_lossy().to_string();
    }

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }

    if let Some(max_rows) = cli.max_rows {
        config.partition.max_rows_per_file = max_rows;
    }
}

fn read_input(input: &PathBuf) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read stdin")?;
        return Ok(content);
    }
    std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{}", rendered);
    Ok(())
}
