use serde_json::json;
use stockpipe_core::{ObservationQuery, ObservationStore};

use crate::cli::ListArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

pub fn run(args: &ListArgs, context: &Context) -> Result<CommandResult, CliError> {
    if args.limit == 0 {
        return Err(CliError::Usage(String::from("--limit must be at least 1")));
    }

    let query = ObservationQuery {
        trade_code: args.trade_code.clone(),
        limit: Some(args.limit),
        offset: args.offset,
    };
    let warehouse = context.open_warehouse()?;
    let observations = warehouse.list(&query)?;

    Ok(CommandResult::ok(json!({
        "trade_code": args.trade_code,
        "limit": args.limit,
        "offset": args.offset,
        "count": observations.len(),
        "observations": observations,
    })))
}
