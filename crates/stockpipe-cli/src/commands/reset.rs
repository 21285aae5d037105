use stockpipe_core::reset_and_reload;

use crate::cli::ResetArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

pub fn run(args: &ResetArgs, context: &Context) -> Result<CommandResult, CliError> {
    let config = context.pipeline_with_fixture(args.fixture.as_deref());
    let warehouse = context.open_warehouse()?;
    let report = reset_and_reload(&warehouse, &config.fixture_path)?;

    let mut result = CommandResult::ok(serde_json::to_value(&report)?);
    if report.duplicates_removed > 0 {
        result = result.with_warning(format!(
            "fixture repeated {} business keys; first occurrences were loaded",
            report.duplicates_removed
        ));
    }
    Ok(result)
}
