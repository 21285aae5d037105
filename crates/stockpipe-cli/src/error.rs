use stockpipe_core::{PipelineError, ResetError, StoreError};
use stockpipe_warehouse::WarehouseError;
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error("strict mode failed: {error_count} rows rejected")]
    StrictModeViolation { error_count: usize },

    #[error(transparent)]
    Reset(#[from] ResetError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::StrictModeViolation { .. } => 3,
            Self::Reset(_) => 4,
            Self::Store(_) | Self::Warehouse(_) => 5,
            Self::Pipeline(PipelineError::StoreUnavailable(_)) => 5,
            Self::Pipeline(PipelineError::SourceUnavailable { .. }) => 6,
            Self::Pipeline(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn exit_codes_follow_error_category() {
        let source = CliError::from(PipelineError::SourceUnavailable {
            path: PathBuf::from("missing.csv"),
            reason: String::from("file not found"),
        });
        assert_eq!(source.exit_code(), 6);

        let store = CliError::from(PipelineError::StoreUnavailable(StoreError::Unavailable(
            String::from("locked"),
        )));
        assert_eq!(store.exit_code(), 5);

        let reset = CliError::from(ResetError::FixtureMissing {
            path: PathBuf::from("fixture.json"),
            reason: String::from("not found"),
        });
        assert_eq!(reset.exit_code(), 4);

        assert_eq!(CliError::StrictModeViolation { error_count: 1 }.exit_code(), 3);
    }
}
