//! CLI argument definitions for stockpipe.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ingest` | Insert new observations from a CSV/JSON source |
//! | `fixture build` | Write a deduplicated snapshot of a source |
//! | `fixture export` | Write a snapshot of the warehouse contents |
//! | `reset` | Replace the warehouse contents with a fixture |
//! | `codes` | List distinct trade codes |
//! | `list` | Page through stored observations |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Fail when any row was rejected |
//! | `--home` | `$STOCKPIPE_HOME` | Data directory |
//! | `--db` | `<home>/warehouse.duckdb` | Warehouse file |
//!
//! # Examples
//!
//! ```bash
//! stockpipe ingest dataset/stock_market_data.csv --pretty
//! stockpipe fixture build --output fixtures/initial_data.json
//! stockpipe reset --fixture fixtures/initial_data.json
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stockpipe_core::SourceFormat;

/// Stock observation ingestion and fixture rebuild tool.
#[derive(Debug, Parser)]
#[command(
    name = "stockpipe",
    author,
    version,
    about = "Ingest daily stock observations into a local DuckDB warehouse"
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat rejected rows as failures (exit code 3).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Data directory; defaults to `STOCKPIPE_HOME` or `~/.stockpipe`.
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Warehouse database file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object output.
    Json,
    /// Aligned key/value text for terminals.
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    Csv,
    Json,
}

impl From<InputFormat> for SourceFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Csv => Self::Csv,
            InputFormat::Json => Self::Json,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Insert observations not yet stored, skipping known business keys.
    Ingest(IngestArgs),
    /// Build or export fixture snapshots.
    Fixture(FixtureArgs),
    /// Clear the warehouse and reload it from a fixture snapshot.
    Reset(ResetArgs),
    /// List distinct trade codes in the warehouse.
    Codes,
    /// List stored observations, newest first.
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Source file; defaults to the first `dataset/stock_market_data.*` found.
    pub path: Option<PathBuf>,

    /// Source format; inferred from the extension when omitted.
    #[arg(long, value_enum)]
    pub input_format: Option<InputFormat>,

    /// Load existing keys per trade code up front instead of one lookup per row.
    #[arg(long, default_value_t = false)]
    pub preload_keys: bool,
}

#[derive(Debug, Args)]
pub struct FixtureArgs {
    #[command(subcommand)]
    pub command: FixtureCommand,
}

#[derive(Debug, Subcommand)]
pub enum FixtureCommand {
    /// Snapshot a source file.
    Build(FixtureBuildArgs),
    /// Snapshot the warehouse contents.
    Export(FixtureExportArgs),
}

#[derive(Debug, Args)]
pub struct FixtureBuildArgs {
    pub path: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub input_format: Option<InputFormat>,

    /// Fixture file to write; defaults to `<home>/fixtures/initial_data.json`.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct FixtureExportArgs {
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ResetArgs {
    /// Fixture to load; defaults to `<home>/fixtures/initial_data.json`.
    #[arg(long)]
    pub fixture: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub trade_code: Option<String>,

    #[arg(long, default_value_t = 100)]
    pub limit: usize,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,
}
