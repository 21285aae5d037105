use stockpipe_core::{ingest_incremental, locate_source, SourceFormat};

use crate::cli::IngestArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

pub fn run(args: &IngestArgs, context: &Context) -> Result<CommandResult, CliError> {
    let format: Option<SourceFormat> = args.input_format.map(Into::into);
    let candidates = context.pipeline.source_candidates(format);
    let source = locate_source(args.path.as_deref(), format, &candidates)?;

    let mut config = context.pipeline.clone();
    config.preload_existing_keys = args.preload_keys;

    let warehouse = context.open_warehouse()?;
    let report = ingest_incremental(&warehouse, &source, &config)?;

    let errors = report.errors.clone();
    let mut result = CommandResult::ok(serde_json::to_value(&report)?);
    if !errors.is_empty() {
        result = result.with_warning(format!("{} rows were rejected", errors.len()));
    }
    Ok(result.with_errors(errors))
}
