//! Business-key deduplication against the current batch and the store.

use std::collections::HashSet;

use serde::Serialize;
use stockpipe_warehouse::{ObservationStore, StoreError};

use crate::domain::{BusinessKey, StockObservation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupDecision {
    Accept,
    DuplicateInBatch,
    ExistsInStore,
}

/// Membership test for keys that already exist downstream.
pub trait ExistingKeys {
    fn contains(&self, key: &BusinessKey) -> Result<bool, StoreError>;
}

/// Asks the store once per key.
pub struct StoreLookup<'a> {
    store: &'a dyn ObservationStore,
}

impl<'a> StoreLookup<'a> {
    pub fn new(store: &'a dyn ObservationStore) -> Self {
        Self { store }
    }
}

impl ExistingKeys for StoreLookup<'_> {
    fn contains(&self, key: &BusinessKey) -> Result<bool, StoreError> {
        self.store
            .exists_by_key(&key.trade_code, &key.date.format_iso())
    }
}

/// Keys fetched up front for every trade code in a batch.
#[derive(Debug, Default)]
pub struct PreloadedKeys {
    keys: HashSet<(String, String)>,
}

impl PreloadedKeys {
    pub fn load(
        store: &dyn ObservationStore,
        observations: &[StockObservation],
    ) -> Result<Self, StoreError> {
        let mut trade_codes: Vec<String> = observations
            .iter()
            .map(|observation| observation.trade_code.clone())
            .collect();
        trade_codes.sort();
        trade_codes.dedup();

        let keys = store.existing_keys(&trade_codes)?;
        tracing::debug!(
            trade_codes = trade_codes.len(),
            keys = keys.len(),
            "preloaded existing business keys"
        );
        Ok(Self { keys })
    }
}

impl ExistingKeys for PreloadedKeys {
    fn contains(&self, key: &BusinessKey) -> Result<bool, StoreError> {
        Ok(self
            .keys
            .contains(&(key.trade_code.clone(), key.date.format_iso())))
    }
}

/// First occurrence of a key wins; later ones in the same batch are dropped
/// even when the first was itself skipped because the store had it.
pub struct Deduplicator<'a> {
    seen: HashSet<BusinessKey>,
    existing: Option<&'a dyn ExistingKeys>,
}

impl<'a> Deduplicator<'a> {
    /// In-batch deduplication only.
    pub fn batch_only() -> Self {
        Self {
            seen: HashSet::new(),
            existing: None,
        }
    }

    pub fn against(existing: &'a dyn ExistingKeys) -> Self {
        Self {
            seen: HashSet::new(),
            existing: Some(existing),
        }
    }

    pub fn decide(&mut self, observation: &StockObservation) -> Result<DedupDecision, StoreError> {
        let key = observation.key();
        if self.seen.contains(&key) {
            return Ok(DedupDecision::DuplicateInBatch);
        }
        let decision = match self.existing {
            Some(existing) if existing.contains(&key)? => DedupDecision::ExistsInStore,
            _ => DedupDecision::Accept,
        };
        self.seen.insert(key);
        Ok(decision)
    }
}

/// Keep the first item per business key, preserving order.
/// Returns the survivors and how many were dropped.
pub fn keep_first_per_key<T>(items: Vec<T>, key: impl Fn(&T) -> BusinessKey) -> (Vec<T>, usize) {
    let mut seen = HashSet::with_capacity(items.len());
    let total = items.len();
    let kept: Vec<T> = items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TradeDate;
    use stockpipe_warehouse::MemoryStore;

    fn observation(code: &str, date: &str, close: f64) -> StockObservation {
        StockObservation {
            trade_code: code.to_string(),
            date: TradeDate::parse(date).expect("date"),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10,
        }
    }

    #[test]
    fn first_seen_wins_within_batch() {
        let mut dedup = Deduplicator::batch_only();
        let first = observation("ACI", "2020-01-02", 1.0);
        let second = observation("ACI", "2020-01-02", 2.0);

        assert_eq!(dedup.decide(&first).expect("decide"), DedupDecision::Accept);
        assert_eq!(
            dedup.decide(&second).expect("decide"),
            DedupDecision::DuplicateInBatch
        );
        assert_eq!(
            dedup
                .decide(&observation("ACI", "2020-01-03", 1.0))
                .expect("decide"),
            DedupDecision::Accept
        );
    }

    #[test]
    fn store_membership_is_checked_once_per_key() {
        let store = MemoryStore::new();
        store
            .insert(&observation("GP", "2020-01-02", 1.0).to_row())
            .expect("seed");
        let lookup = StoreLookup::new(&store);
        let mut dedup = Deduplicator::against(&lookup);

        let stored = observation("GP", "2020-01-02", 5.0);
        assert_eq!(
            dedup.decide(&stored).expect("decide"),
            DedupDecision::ExistsInStore
        );
        assert_eq!(
            dedup.decide(&stored).expect("decide"),
            DedupDecision::DuplicateInBatch
        );
    }

    #[test]
    fn preloaded_keys_match_store_lookup() {
        let store = MemoryStore::new();
        store
            .insert(&observation("GP", "2020-01-02", 1.0).to_row())
            .expect("seed");
        store
            .insert(&observation("ACI", "2020-01-02", 1.0).to_row())
            .expect("seed");

        let batch = vec![
            observation("GP", "2020-01-02", 1.0),
            observation("GP", "2020-01-03", 1.0),
        ];
        let preloaded = PreloadedKeys::load(&store, &batch).expect("preload");
        let gp = |date: &str| BusinessKey {
            trade_code: String::from("GP"),
            date: TradeDate::parse(date).expect("date"),
        };
        assert!(preloaded.contains(&gp("2020-01-02")).expect("contains"));
        assert!(!preloaded.contains(&gp("2020-01-03")).expect("contains"));

        let mut dedup = Deduplicator::against(&preloaded);
        let decisions: Vec<_> = batch
            .iter()
            .map(|item| dedup.decide(item).expect("decide"))
            .collect();
        assert_eq!(
            decisions,
            vec![DedupDecision::ExistsInStore, DedupDecision::Accept]
        );
    }

    #[test]
    fn keep_first_per_key_counts_dropped_items() {
        let items = vec![
            observation("ACI", "2020-01-02", 1.0),
            observation("ACI", "2020-01-02", 2.0),
            observation("GP", "2020-01-02", 3.0),
        ];
        let (kept, dropped) = keep_first_per_key(items, StockObservation::key);

        assert_eq!(dropped, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].close, 1.0);
    }
}
