//! Reset-and-reload: replace the store's contents with a fixture snapshot.
//!
//! Stages run strictly in order and stop at the first failure:
//!
//! 1. `verify` reads and decodes the fixture without touching the store
//! 2. `clear` deletes every stored observation
//! 3. `resequence_identity` makes the next ordinal 1
//! 4. `load` inserts the fixture records as one batch
//!
//! Verify runs first so a bad fixture never costs the existing data.

use std::path::Path;

use serde::Serialize;
use stockpipe_warehouse::ObservationStore;

use crate::dedup::keep_first_per_key;
use crate::domain::StockObservation;
use crate::error::{ResetError, ResetStage};
use crate::loader;
use crate::snapshot::{read_fixture, FixtureEntry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReloadOutcome {
    pub cleared_count: usize,
    pub loaded_count: usize,
    /// Fixture entries dropped because an earlier entry had the same key.
    pub duplicates_removed: usize,
}

pub fn run(store: &dyn ObservationStore, fixture_path: &Path) -> Result<ReloadOutcome, ResetError> {
    enter(ResetStage::Verify);
    let observations = verify(fixture_path)?;
    let (observations, duplicates_removed) =
        keep_first_per_key(observations, StockObservation::key);
    if duplicates_removed > 0 {
        tracing::warn!(duplicates_removed, "fixture contains repeated business keys");
    }

    enter(ResetStage::Clear);
    let prior_count = store
        .count()
        .map_err(|source| ResetError::ClearFailed {
            prior_count: None,
            source,
        })?;
    let cleared_count = loader::clear(store).map_err(|source| ResetError::ClearFailed {
        prior_count: Some(prior_count),
        source,
    })?;

    enter(ResetStage::ResequenceIdentity);
    store
        .reset_ordinal_sequence()
        .map_err(|source| ResetError::SequenceResetFailed {
            cleared_count,
            source,
        })?;

    enter(ResetStage::Load);
    let loaded_count = loader::load_all(store, &observations).map_err(|source| {
        let committed = store.count().ok();
        ResetError::LoadFailed {
            cleared_count,
            attempted: observations.len(),
            committed,
            source,
        }
    })?;

    Ok(ReloadOutcome {
        cleared_count,
        loaded_count,
        duplicates_removed,
    })
}

fn enter(stage: ResetStage) {
    tracing::info!(%stage, "reset stage started");
}

/// Fixture entries in `pk` order.
fn verify(fixture_path: &Path) -> Result<Vec<StockObservation>, ResetError> {
    let mut entries: Vec<FixtureEntry> = read_fixture(fixture_path)?;
    entries.sort_by_key(|entry| entry.pk);
    tracing::debug!(entries = entries.len(), "fixture verified");
    Ok(entries.iter().map(FixtureEntry::to_observation).collect())
}
