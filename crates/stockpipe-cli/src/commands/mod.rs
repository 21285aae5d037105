mod codes;
mod fixture;
mod ingest;
mod list;
mod reset;

use std::path::Path;

use serde_json::Value;
use stockpipe_core::{PipelineConfig, RowError};
use stockpipe_warehouse::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<RowError>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<RowError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

/// Settings resolved from global flags.
pub struct Context {
    pub warehouse: WarehouseConfig,
    pub pipeline: PipelineConfig,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Self {
        let mut warehouse = match &cli.home {
            Some(home) => WarehouseConfig::with_home(home.clone()),
            None => WarehouseConfig::default(),
        };
        if let Some(db) = &cli.db {
            warehouse.db_path = db.clone();
        }
        let pipeline = PipelineConfig::with_home(warehouse.stockpipe_home.clone());
        Self {
            warehouse,
            pipeline,
        }
    }

    pub fn open_warehouse(&self) -> Result<Warehouse, CliError> {
        tracing::debug!(db = %self.warehouse.db_path.display(), "opening warehouse");
        Ok(Warehouse::open(self.warehouse.clone())?)
    }

    /// Pipeline settings with the fixture path overridden when given.
    pub fn pipeline_with_fixture(&self, fixture: Option<&Path>) -> PipelineConfig {
        let mut config = self.pipeline.clone();
        if let Some(path) = fixture {
            config.fixture_path = path.to_path_buf();
        }
        config
    }
}

pub fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let context = Context::from_cli(cli);

    match &cli.command {
        Command::Ingest(args) => ingest::run(args, &context),
        Command::Fixture(args) => fixture::run(args, &context),
        Command::Reset(args) => reset::run(args, &context),
        Command::Codes => codes::run(&context),
        Command::List(args) => list::run(args, &context),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::*;

    fn cli(home: &Path, args: &[&str]) -> Cli {
        let home = home.to_str().expect("utf8 temp path");
        let mut argv = vec!["stockpipe", "--home", home];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn db_flag_overrides_home_default() {
        let cli = Cli::parse_from([
            "stockpipe",
            "--home",
            "/srv/stockpipe",
            "--db",
            "/tmp/other.duckdb",
            "codes",
        ]);
        let context = Context::from_cli(&cli);

        assert_eq!(context.warehouse.db_path, PathBuf::from("/tmp/other.duckdb"));
        assert_eq!(
            context.pipeline.fixture_path,
            PathBuf::from("/srv/stockpipe/fixtures/initial_data.json")
        );
    }

    #[test]
    fn ingest_then_reset_round_trip_through_commands() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dataset = temp.path().join("dataset");
        std::fs::create_dir_all(&dataset).expect("dataset dir");
        std::fs::write(
            dataset.join("stock_market_data.csv"),
            "date,trade_code,open,high,low,close,volume\n\
             2020-01-02,ACI,1,2,0.5,1.5,\"1,000\"\n\
             2020-01-02,GP,1,2,0.5,1.5,10\n\
             2020-01-03,GP,1,,0.5,1.5,10\n",
        )
        .expect("write dataset");

        let ingested = run(&cli(temp.path(), &["ingest"])).expect("ingest");
        assert_eq!(ingested.data["inserted_count"], 2);
        assert_eq!(ingested.errors.len(), 1);
        assert_eq!(ingested.warnings.len(), 1);

        let exported = run(&cli(temp.path(), &["fixture", "export"])).expect("export");
        assert_eq!(exported.data["written_count"], 2);

        let reset = run(&cli(temp.path(), &["reset"])).expect("reset");
        assert_eq!(reset.data["cleared_count"], 2);
        assert_eq!(reset.data["loaded_count"], 2);

        let codes = run(&cli(temp.path(), &["codes"])).expect("codes");
        assert_eq!(codes.data["trade_codes"], serde_json::json!(["ACI", "GP"]));

        let page = run(&cli(temp.path(), &["list", "--trade-code", "GP"])).expect("list");
        assert_eq!(page.data["count"], 1);
        assert_eq!(page.data["observations"][0]["id"], 2);
    }

    #[test]
    fn zero_limit_is_a_usage_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let error = run(&cli(temp.path(), &["list", "--limit", "0"])).err().expect("usage error");
        assert_eq!(error.exit_code(), 2);
    }
}
