use serde_json::json;
use stockpipe_core::list_distinct_instrument_codes;

use crate::error::CliError;

use super::{CommandResult, Context};

pub fn run(context: &Context) -> Result<CommandResult, CliError> {
    let warehouse = context.open_warehouse()?;
    let codes = list_distinct_instrument_codes(&warehouse)?;
    Ok(CommandResult::ok(json!({
        "count": codes.len(),
        "trade_codes": codes,
    })))
}
