//! Deterministic fixture snapshots.
//!
//! A snapshot is a JSON array of `{model, pk, fields}` entries ordered by
//! `(date, trade_code)` with `pk` numbered densely from 1. The same record set
//! always renders to the same bytes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{StockObservation, TradeDate};
use crate::error::{PipelineError, RecordError, ResetError, RowError};

/// Observation paired with the source row it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedObservation {
    pub row_index: usize,
    pub observation: StockObservation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureFields {
    pub date: TradeDate,
    pub trade_code: String,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub close: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureEntry {
    pub model: String,
    pub pk: u64,
    pub fields: FixtureFields,
}

impl FixtureEntry {
    pub fn to_observation(&self) -> StockObservation {
        StockObservation {
            trade_code: self.fields.trade_code.clone(),
            date: self.fields.date,
            open: self.fields.open,
            high: self.fields.high,
            low: self.fields.low,
            close: self.fields.close,
            volume: self.fields.volume,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub entries: Vec<FixtureEntry>,
    /// Records dropped by the final invariant check.
    pub excluded: Vec<RowError>,
}

pub fn build_snapshot(records: Vec<SourcedObservation>, model: &str) -> Snapshot {
    let mut excluded = Vec::new();
    let mut kept: Vec<StockObservation> = Vec::with_capacity(records.len());
    for record in records {
        match record.observation.check_invariants() {
            Ok(()) => kept.push(record.observation),
            Err(error) => {
                tracing::warn!(
                    row_index = record.row_index,
                    %error,
                    "excluding record from snapshot"
                );
                excluded.push(RowError::new(record.row_index, &RecordError::Invalid(error)));
            }
        }
    }

    kept.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.trade_code.cmp(&b.trade_code))
    });

    let entries = kept
        .into_iter()
        .zip(1_u64..)
        .map(|(observation, pk)| FixtureEntry {
            model: model.to_owned(),
            pk,
            fields: FixtureFields {
                date: observation.date,
                trade_code: observation.trade_code,
                high: observation.high,
                low: observation.low,
                open: observation.open,
                close: observation.close,
                volume: observation.volume,
            },
        })
        .collect();

    Snapshot { entries, excluded }
}

/// Render entries as 4-space indented JSON with a trailing newline.
pub fn render_fixture(entries: &[FixtureEntry]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    entries.serialize(&mut serializer)?;
    buffer.push(b'\n');
    Ok(buffer)
}

pub fn write_fixture(path: &Path, entries: &[FixtureEntry]) -> Result<(), PipelineError> {
    let bytes = render_fixture(entries)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PipelineError::FixtureWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| PipelineError::FixtureWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and decode a fixture file, classifying failures for the verify stage.
pub fn read_fixture(path: &Path) -> Result<Vec<FixtureEntry>, ResetError> {
    let text = fs::read_to_string(path).map_err(|error| ResetError::FixtureMissing {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;

    let entries: Vec<FixtureEntry> =
        serde_json::from_str(&text).map_err(|error| ResetError::FixtureInvalid {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

    for entry in &entries {
        entry
            .to_observation()
            .check_invariants()
            .map_err(|error| ResetError::FixtureInvalid {
                path: path.to_path_buf(),
                reason: format!("entry pk {}: {error}", entry.pk),
            })?;
    }
    Ok(entries)
}
