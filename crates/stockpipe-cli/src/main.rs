mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

fn main() {
    init_tracing();

    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    let result = commands::run(&cli)?;
    output::render(&result, cli.format, cli.pretty)?;

    if cli.strict && !result.errors.is_empty() {
        return Err(CliError::StrictModeViolation {
            error_count: result.errors.len(),
        });
    }

    Ok(())
}
