use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::commands::CommandResult;
use crate::error::CliError;

pub fn render(result: &CommandResult, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = envelope(result);
            let text = if pretty {
                serde_json::to_string_pretty(&payload)?
            } else {
                serde_json::to_string(&payload)?
            };
            println!("{text}");
        }
        OutputFormat::Table => render_table(result)?,
    }

    Ok(())
}

fn envelope(result: &CommandResult) -> Value {
    json!({
        "data": result.data,
        "warnings": result.warnings,
        "errors": result.errors,
    })
}

fn render_table(result: &CommandResult) -> Result<(), CliError> {
    match &result.data {
        Value::Object(fields) => {
            let width = fields.keys().map(String::len).max().unwrap_or(0);
            for (key, value) in fields {
                match value {
                    Value::Array(items) if !items.is_empty() => {
                        println!("{key:<width$}:");
                        for item in items {
                            println!("  - {}", inline(item)?);
                        }
                    }
                    _ => println!("{key:<width$}: {}", inline(value)?),
                }
            }
        }
        other => println!("{}", inline(other)?),
    }

    if !result.warnings.is_empty() {
        println!("warnings:");
        for warning in &result.warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}

fn inline(value: &Value) -> Result<String, CliError> {
    Ok(match value {
        Value::String(text) => text.clone(),
        Value::Null => String::from("-"),
        other => serde_json::to_string(other)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_data_and_row_errors() {
        let result = CommandResult::ok(json!({ "inserted_count": 2 }))
            .with_warning("1 rows were rejected")
            .with_errors(vec![stockpipe_core::RowError {
                row_index: 4,
                reason: String::from("invalid record: high missing"),
            }]);

        let payload = envelope(&result);
        assert_eq!(payload["data"]["inserted_count"], 2);
        assert_eq!(payload["errors"][0]["row_index"], 4);
        assert_eq!(payload["warnings"][0], "1 rows were rejected");
    }

    #[test]
    fn strings_render_without_quotes() {
        assert_eq!(inline(&json!("ACI")).expect("inline"), "ACI");
        assert_eq!(inline(&json!(null)).expect("inline"), "-");
        assert_eq!(inline(&json!({"a": 1})).expect("inline"), "{\"a\":1}");
    }
}
