//! Bulk loading into an [`ObservationStore`].

use serde::Serialize;
use stockpipe_warehouse::{ObservationRow, ObservationStore, StoreError};

use crate::dedup::{DedupDecision, Deduplicator};
use crate::domain::StockObservation;
use crate::error::{PipelineError, RecordError, RowError};
use crate::snapshot::SourcedObservation;

/// Counters from one incremental load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IncrementalOutcome {
    pub inserted: usize,
    pub duplicate_in_batch: usize,
    pub existing_in_store: usize,
    pub errors: Vec<RowError>,
}

impl IncrementalOutcome {
    pub fn skipped(&self) -> usize {
        self.duplicate_in_batch + self.existing_in_store
    }
}

/// Insert each new observation on its own.
///
/// A uniqueness conflict only fails its row, since another writer may have
/// stored the key after the dedup check. Any other store error ends the run.
pub fn load_incremental(
    store: &dyn ObservationStore,
    records: &[SourcedObservation],
    dedup: &mut Deduplicator<'_>,
    progress_interval: usize,
) -> Result<IncrementalOutcome, PipelineError> {
    let mut outcome = IncrementalOutcome::default();

    for (position, record) in records.iter().enumerate() {
        match dedup.decide(&record.observation)? {
            DedupDecision::DuplicateInBatch => outcome.duplicate_in_batch += 1,
            DedupDecision::ExistsInStore => outcome.existing_in_store += 1,
            DedupDecision::Accept => match store.insert(&record.observation.to_row()) {
                Ok(_) => outcome.inserted += 1,
                Err(error @ StoreError::Conflict { .. }) => {
                    tracing::warn!(row_index = record.row_index, %error, "insert rejected");
                    outcome.errors.push(RowError::new(
                        record.row_index,
                        &RecordError::Rejected(error.to_string()),
                    ));
                }
                Err(error) => return Err(PipelineError::StoreUnavailable(error)),
            },
        }

        let processed = position + 1;
        if progress_interval > 0 && processed % progress_interval == 0 {
            tracing::info!(
                processed,
                total = records.len(),
                inserted = outcome.inserted,
                "ingestion progress"
            );
        }
    }

    Ok(outcome)
}

/// Remove every stored observation.
pub fn clear(store: &dyn ObservationStore) -> Result<usize, StoreError> {
    store.delete_all()
}

/// Insert a whole batch as one unit.
pub fn load_all(
    store: &dyn ObservationStore,
    observations: &[StockObservation],
) -> Result<usize, StoreError> {
    let rows: Vec<ObservationRow> = observations.iter().map(StockObservation::to_row).collect();
    store.insert_many(&rows)
}
