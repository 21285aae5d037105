use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use serde::Serialize;
use stockpipe_warehouse::StoreError;
use thiserror::Error;

/// A present field whose raw value could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("field '{field}' cannot be parsed from {value:?}")]
pub struct MalformedRecord {
    pub field: &'static str,
    pub value: String,
}

impl MalformedRecord {
    pub fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

/// Why a single field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    NonFinite,
    Negative,
    TooLong,
}

impl Display for ViolationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Missing => "missing",
            Self::NonFinite => "not finite",
            Self::Negative => "negative",
            Self::TooLong => "too long",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub kind: ViolationKind,
}

/// Every violated field of one record, reported together.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid record: {}", describe_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Names of all violated fields, in required-field order.
    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|violation| violation.field).collect()
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.violations
            .iter()
            .filter(|violation| violation.kind == ViolationKind::Missing)
            .map(|violation| violation.field)
            .collect()
    }
}

fn describe_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|violation| format!("{} {}", violation.field, violation.kind))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-row failure; the row is skipped and the batch continues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error(transparent)]
    Malformed(#[from] MalformedRecord),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("rejected by store: {0}")]
    Rejected(String),
}

/// A recoverable problem tied to a source row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 0-based data row position in the source.
    pub row_index: usize,
    pub reason: String,
}

impl RowError {
    pub fn new(row_index: usize, error: &RecordError) -> Self {
        Self {
            row_index,
            reason: error.to_string(),
        }
    }
}

/// Run-level failures of ingestion and fixture generation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source unavailable: {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error(transparent)]
    StoreUnavailable(StoreError),

    #[error("cannot write fixture {path}: {source}")]
    FixtureWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode fixture: {0}")]
    FixtureEncode(#[from] serde_json::Error),
}

impl From<StoreError> for PipelineError {
    fn from(error: StoreError) -> Self {
        Self::StoreUnavailable(error)
    }
}

/// Stages of a reset-and-reload run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetStage {
    Verify,
    Clear,
    ResequenceIdentity,
    Load,
}

impl ResetStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Clear => "clear",
            Self::ResequenceIdentity => "resequence_identity",
            Self::Load => "load",
        }
    }
}

impl Display for ResetStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a reset-and-reload run; names the stage and partial progress.
#[derive(Debug, Error)]
pub enum ResetError {
    #[error("verify: fixture {path} is missing or unreadable: {reason}")]
    FixtureMissing { path: PathBuf, reason: String },

    #[error("verify: fixture {path} is not a valid snapshot: {reason}")]
    FixtureInvalid { path: PathBuf, reason: String },

    #[error("clear: store may be partially cleared (held {} records before): {source}", display_count(.prior_count))]
    ClearFailed {
        prior_count: Option<usize>,
        #[source]
        source: StoreError,
    },

    #[error("resequence_identity: store is empty after clearing {cleared_count} records but ordinals were not reset: {source}")]
    SequenceResetFailed {
        cleared_count: usize,
        #[source]
        source: StoreError,
    },

    #[error("load: {} of {attempted} fixture records committed before failure: {source}", display_count(.committed))]
    LoadFailed {
        cleared_count: usize,
        attempted: usize,
        committed: Option<usize>,
        #[source]
        source: StoreError,
    },
}

impl ResetError {
    pub const fn stage(&self) -> ResetStage {
        match self {
            Self::FixtureMissing { .. } | Self::FixtureInvalid { .. } => ResetStage::Verify,
            Self::ClearFailed { .. } => ResetStage::Clear,
            Self::SequenceResetFailed { .. } => ResetStage::ResequenceIdentity,
            Self::LoadFailed { .. } => ResetStage::Load,
        }
    }
}

fn display_count(count: &Option<usize>) -> String {
    count.map_or_else(|| String::from("unknown"), |count| count.to_string())
}
