//! Operations offered to outer layers (CLI, HTTP handlers).
//!
//! Each operation takes the store handle explicitly, runs inside its own
//! `tracing` span tagged with a fresh `run_id`, and returns a serialisable
//! report. Row-level problems are collected in the report; run-level
//! failures are returned as errors.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use stockpipe_warehouse::{ObservationQuery, ObservationStore};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::dedup::{keep_first_per_key, Deduplicator, ExistingKeys, PreloadedKeys, StoreLookup};
use crate::domain::StockObservation;
use crate::error::{PipelineError, RecordError, ResetError, RowError};
use crate::loader;
use crate::normalize::normalize;
use crate::reload;
use crate::snapshot::{build_snapshot, write_fixture, SourcedObservation};
use crate::source::{RawRow, Source};
use crate::validate::validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub source: String,
    pub inserted_count: usize,
    /// Duplicates within the batch plus keys already stored.
    pub skipped_count: usize,
    pub duplicate_in_batch: usize,
    pub existing_in_store: usize,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixtureReport {
    pub run_id: Uuid,
    pub source: String,
    pub written_count: usize,
    pub duplicate_count: usize,
    pub fixture_path: PathBuf,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadReport {
    pub run_id: Uuid,
    pub fixture_path: PathBuf,
    pub cleared_count: usize,
    pub loaded_count: usize,
    pub duplicates_removed: usize,
}

/// Insert the source's new observations, skipping keys already present.
pub fn ingest_incremental(
    store: &dyn ObservationStore,
    source: &Source,
    config: &PipelineConfig,
) -> Result<IngestReport, PipelineError> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("ingest_incremental", %run_id, source = %source.path.display());
    let _guard = span.enter();

    let rows = source.read_rows()?;
    tracing::info!(rows = rows.len(), "source read");
    let (records, mut errors) = prepare(rows);

    let preloaded;
    let lookup;
    let existing: &dyn ExistingKeys = if config.preload_existing_keys {
        let observations: Vec<StockObservation> = records
            .iter()
            .map(|record| record.observation.clone())
            .collect();
        preloaded = PreloadedKeys::load(store, &observations)?;
        &preloaded
    } else {
        lookup = StoreLookup::new(store);
        &lookup
    };

    let mut dedup = Deduplicator::against(existing);
    let outcome = loader::load_incremental(store, &records, &mut dedup, config.progress_interval)?;

    errors.extend(outcome.errors.iter().cloned());
    errors.sort_by_key(|error| error.row_index);

    tracing::info!(
        inserted = outcome.inserted,
        skipped = outcome.skipped(),
        errors = errors.len(),
        "ingestion finished"
    );

    Ok(IngestReport {
        run_id,
        source: source.path.display().to_string(),
        inserted_count: outcome.inserted,
        skipped_count: outcome.skipped(),
        duplicate_in_batch: outcome.duplicate_in_batch,
        existing_in_store: outcome.existing_in_store,
        errors,
    })
}

/// Write a deduplicated, sorted snapshot of the source to `config.fixture_path`.
/// The store is not consulted.
pub fn build_fixture(source: &Source, config: &PipelineConfig) -> Result<FixtureReport, PipelineError> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("build_fixture", %run_id, source = %source.path.display());
    let _guard = span.enter();

    let rows = source.read_rows()?;
    let (records, mut errors) = prepare(rows);
    let (records, duplicate_count) =
        keep_first_per_key(records, |record| record.observation.key());
    if duplicate_count > 0 {
        tracing::info!(duplicate_count, "dropped repeated business keys");
    }

    let snapshot = build_snapshot(records, &config.fixture_model);
    write_fixture(&config.fixture_path, &snapshot.entries)?;
    errors.extend(snapshot.excluded);
    errors.sort_by_key(|error| error.row_index);

    tracing::info!(
        written = snapshot.entries.len(),
        fixture = %config.fixture_path.display(),
        "fixture written"
    );

    Ok(FixtureReport {
        run_id,
        source: source.path.display().to_string(),
        written_count: snapshot.entries.len(),
        duplicate_count,
        fixture_path: config.fixture_path.clone(),
        errors,
    })
}

/// Write the store's current contents as a fixture, through the same builder
/// as [`build_fixture`].
pub fn snapshot_store(
    store: &dyn ObservationStore,
    config: &PipelineConfig,
) -> Result<FixtureReport, PipelineError> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("snapshot_store", %run_id);
    let _guard = span.enter();

    let stored = store.list(&ObservationQuery::all())?;
    let mut errors = Vec::new();
    let mut records = Vec::with_capacity(stored.len());
    for (row_index, item) in stored.iter().enumerate() {
        match StockObservation::from_stored(item) {
            Ok(observation) => records.push(SourcedObservation {
                row_index,
                observation,
            }),
            Err(error) => {
                tracing::warn!(row_index, id = item.id, %error, "skipping unreadable stored row");
                errors.push(RowError::new(row_index, &RecordError::Malformed(error)));
            }
        }
    }

    let snapshot = build_snapshot(records, &config.fixture_model);
    write_fixture(&config.fixture_path, &snapshot.entries)?;
    errors.extend(snapshot.excluded);

    Ok(FixtureReport {
        run_id,
        source: String::from("store"),
        written_count: snapshot.entries.len(),
        duplicate_count: 0,
        fixture_path: config.fixture_path.clone(),
        errors,
    })
}

/// Replace the store's contents with the fixture at `fixture_path`.
pub fn reset_and_reload(
    store: &dyn ObservationStore,
    fixture_path: &Path,
) -> Result<ReloadReport, ResetError> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("reset_and_reload", %run_id, fixture = %fixture_path.display());
    let _guard = span.enter();

    match reload::run(store, fixture_path) {
        Ok(outcome) => {
            tracing::info!(
                cleared = outcome.cleared_count,
                loaded = outcome.loaded_count,
                "reset and reload finished"
            );
            Ok(ReloadReport {
                run_id,
                fixture_path: fixture_path.to_path_buf(),
                cleared_count: outcome.cleared_count,
                loaded_count: outcome.loaded_count,
                duplicates_removed: outcome.duplicates_removed,
            })
        }
        Err(error) => {
            tracing::error!(stage = %error.stage(), %error, "reset and reload failed");
            Err(error)
        }
    }
}

pub fn list_distinct_instrument_codes(
    store: &dyn ObservationStore,
) -> Result<BTreeSet<String>, PipelineError> {
    Ok(store.distinct_trade_codes()?)
}

/// Normalize and validate every row, keeping source order.
fn prepare(rows: Vec<RawRow>) -> (Vec<SourcedObservation>, Vec<RowError>) {
    let mut records = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for row in rows {
        let checked = normalize(&row)
            .map_err(RecordError::from)
            .and_then(|record| validate(record).map_err(RecordError::from));
        match checked {
            Ok(observation) => records.push(SourcedObservation {
                row_index: row.index,
                observation,
            }),
            Err(error) => {
                tracing::warn!(row_index = row.index, %error, "skipping row");
                errors.push(RowError::new(row.index, &error));
            }
        }
    }

    (records, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpipe_warehouse::MemoryStore;

    fn write_csv(dir: &Path, body: &str) -> Source {
        let path = dir.join("stock_market_data.csv");
        std::fs::write(&path, body).expect("write csv");
        Source::new(path, None)
    }

    const HEADER: &str = "date,trade_code,open,high,low,close,volume\n";

    #[test]
    fn prepare_keeps_good_rows_and_indexes_bad_ones() {
        let rows = vec![
            RawRow::new(0)
                .with("date", "2020-01-02")
                .with("trade_code", "ACI")
                .with("open", "1")
                .with("high", "2")
                .with("low", "0.5")
                .with("close", "1.5")
                .with("volume", "10"),
            RawRow::new(1).with("date", "2020-01-02"),
            RawRow::new(2).with("date", "bad"),
        ];

        let (records, errors) = prepare(rows);
        assert_eq!(records.len(), 1);
        let indexes: Vec<_> = errors.iter().map(|error| error.row_index).collect();
        assert_eq!(indexes, vec![1, 2]);
    }

    #[test]
    fn ingest_reports_row_errors_without_aborting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = write_csv(
            dir.path(),
            &format!(
                "{HEADER}2020-01-02,ACI,1,2,0.5,1.5,10\n2020-01-03,ACI,1,,0.5,1.5,\n2020-01-04,ACI,1,2,0.5,1.5,10\n"
            ),
        );
        let store = MemoryStore::new();
        let config = PipelineConfig::with_home(dir.path());

        let report = ingest_incremental(&store, &source, &config).expect("ingest");
        assert_eq!(report.inserted_count, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row_index, 1);
        assert!(report.errors[0].reason.contains("high"));
        assert!(report.errors[0].reason.contains("volume"));
    }

    #[test]
    fn preloading_keys_gives_the_same_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = write_csv(
            dir.path(),
            &format!("{HEADER}2020-01-02,ACI,1,2,0.5,1.5,10\n2020-01-03,GP,1,2,0.5,1.5,10\n"),
        );
        let store = MemoryStore::new();
        let mut config = PipelineConfig::with_home(dir.path());
        ingest_incremental(&store, &source, &config).expect("first ingest");

        config.preload_existing_keys = true;
        let report = ingest_incremental(&store, &source, &config).expect("second ingest");
        assert_eq!(report.inserted_count, 0);
        assert_eq!(report.existing_in_store, 2);
    }

    #[test]
    fn missing_source_is_fatal_before_any_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = MemoryStore::new();
        let source = Source::new(dir.path().join("absent.csv"), None);

        let error = ingest_incremental(&store, &source, &PipelineConfig::with_home(dir.path()))
            .expect_err("missing source");
        assert!(matches!(error, PipelineError::SourceUnavailable { .. }));
        assert_eq!(store.count().expect("count"), 0);
    }

    #[test]
    fn distinct_codes_pass_through() {
        let store = MemoryStore::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let source = write_csv(
            dir.path(),
            &format!("{HEADER}2020-01-02,GP,1,2,0.5,1.5,10\n2020-01-02,ACI,1,2,0.5,1.5,10\n"),
        );
        ingest_incremental(&store, &source, &PipelineConfig::with_home(dir.path())).expect("ingest");

        let codes = list_distinct_instrument_codes(&store).expect("codes");
        assert_eq!(codes.into_iter().collect::<Vec<_>>(), vec!["ACI", "GP"]);
    }
}
