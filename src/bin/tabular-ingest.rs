//! Command-line front end.
//!
//! Usage:
//!     tabular-ingest preview data.csv
//!     tabular-ingest load data.csv --table people --columns name,age --type age=INT

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tabular_ingest::config::PipelineConfig;
use tabular_ingest::ingestion::{preview_path, SourceFormat};
use tabular_ingest::load::{load_table, LoadJob, LoadOptions};
use tabular_ingest::store::DuckDbStore;
use tabular_ingest::types::ColumnSpec;

#[derive(Parser, Debug)]
#[command(name = "tabular-ingest", about = "Preview tabular files and load them into DuckDB")]
struct Args {
    /// TOML configuration file
    #[arg(long, global = true, env = "TABULAR_INGEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the headers and up to ten rows as JSON
    Preview { file: PathBuf },

    /// Load selected columns into a new table
    Load {
        file: PathBuf,

        /// Target table name (sanitized to [a-z0-9_])
        #[arg(long)]
        table: String,

        /// Comma-separated column names, in persisted order
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Logical type for a column, as NAME=TYPE (repeatable)
        #[arg(long = "type", value_parser = parse_column_type)]
        types: Vec<(String, String)>,

        /// Database file (overrides config)
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

fn parse_column_type(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, ty)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), ty.trim().to_string()))
        }
        _ => Err(format!("expected NAME=TYPE, got '{raw}'")),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabular_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    config.apply_env_overrides()?;

    match args.command {
        Command::Preview { file } => {
            let preview = preview_path(&file)
                .with_context(|| format!("failed to preview {}", file.display()))?;
            let out = serde_json::json!({
                "headers": preview.headers,
                "rows": preview.json_rows(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Load {
            file,
            table,
            columns,
            types,
            database,
        } => {
            if columns.iter().any(|c| c.trim().is_empty()) {
                bail!("--columns must not contain empty names");
            }
            let types: HashMap<String, String> = types.into_iter().collect();
            let specs: Vec<ColumnSpec> = columns
                .iter()
                .map(|c| match types.get(c) {
                    Some(t) => ColumnSpec::new(c).with_type(t),
                    None => ColumnSpec::new(c),
                })
                .collect();

            let database = database.unwrap_or(config.database.clone());
            let mut store = DuckDbStore::open(&database)
                .with_context(|| format!("failed to open {}", database.display()))?;

            let job = LoadJob::from_specs(table, &specs);
            let options = LoadOptions {
                batch_size: config.batch_size,
                ..LoadOptions::default()
            };
            let report = load_table(
                &mut store,
                &file,
                SourceFormat::classify(&file),
                &job,
                &options,
            )?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
