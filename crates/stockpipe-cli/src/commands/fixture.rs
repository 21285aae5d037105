use stockpipe_core::{build_fixture, locate_source, snapshot_store, FixtureReport, SourceFormat};

use crate::cli::{FixtureArgs, FixtureCommand};
use crate::error::CliError;

use super::{CommandResult, Context};

pub fn run(args: &FixtureArgs, context: &Context) -> Result<CommandResult, CliError> {
    let report = match &args.command {
        FixtureCommand::Build(build) => {
            let format: Option<SourceFormat> = build.input_format.map(Into::into);
            let candidates = context.pipeline.source_candidates(format);
            let source = locate_source(build.path.as_deref(), format, &candidates)?;
            let config = context.pipeline_with_fixture(build.output.as_deref());
            build_fixture(&source, &config)?
        }
        FixtureCommand::Export(export) => {
            let config = context.pipeline_with_fixture(export.output.as_deref());
            let warehouse = context.open_warehouse()?;
            snapshot_store(&warehouse, &config)?
        }
    };

    into_result(report)
}

fn into_result(report: FixtureReport) -> Result<CommandResult, CliError> {
    let mut result = CommandResult::ok(serde_json::to_value(&report)?);
    if report.duplicate_count > 0 {
        result = result.with_warning(format!(
            "{} duplicate business keys were dropped",
            report.duplicate_count
        ));
    }
    Ok(result.with_errors(report.errors))
}
