//! In-process store used for dry runs and tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::store::{ObservationQuery, ObservationRow, ObservationStore, StoreError, StoredObservation};

struct MemoryState {
    rows: BTreeMap<(String, String), StoredObservation>,
    next_id: i64,
}

/// `ObservationStore` backed by an ordered map keyed on `(trade_code, date)`.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable(String::from("memory store mutex poisoned")))
    }
}

impl ObservationStore for MemoryStore {
    fn exists_by_key(&self, trade_code: &str, date: &str) -> Result<bool, StoreError> {
        let state = self.lock()?;
        Ok(state
            .rows
            .contains_key(&(trade_code.to_string(), date.to_string())))
    }

    fn existing_keys(&self, trade_codes: &[String]) -> Result<HashSet<(String, String)>, StoreError> {
        let wanted: HashSet<&str> = trade_codes.iter().map(String::as_str).collect();
        let state = self.lock()?;
        Ok(state
            .rows
            .keys()
            .filter(|(code, _)| wanted.contains(code.as_str()))
            .cloned()
            .collect())
    }

    fn insert(&self, row: &ObservationRow) -> Result<i64, StoreError> {
        let mut state = self.lock()?;
        let key = row.key();
        if state.rows.contains_key(&key) {
            return Err(StoreError::Conflict {
                key: row.describe_key(),
            });
        }

        let id = state.next_id;
        state.next_id += 1;
        state.rows.insert(
            key,
            StoredObservation {
                id,
                row: row.clone(),
            },
        );
        Ok(id)
    }

    fn insert_many(&self, rows: &[ObservationRow]) -> Result<usize, StoreError> {
        let mut state = self.lock()?;

        let mut batch_keys = HashSet::with_capacity(rows.len());
        for row in rows {
            let key = row.key();
            if state.rows.contains_key(&key) || !batch_keys.insert(key) {
                return Err(StoreError::Conflict {
                    key: row.describe_key(),
                });
            }
        }

        for row in rows {
            let id = state.next_id;
            state.next_id += 1;
            state.rows.insert(
                row.key(),
                StoredObservation {
                    id,
                    row: row.clone(),
                },
            );
        }
        Ok(rows.len())
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let mut state = self.lock()?;
        let removed = state.rows.len();
        state.rows.clear();
        Ok(removed)
    }

    fn reset_ordinal_sequence(&self) -> Result<(), StoreError> {
        self.lock()?.next_id = 1;
        Ok(())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.rows.len())
    }

    fn distinct_trade_codes(&self) -> Result<BTreeSet<String>, StoreError> {
        let state = self.lock()?;
        Ok(state.rows.keys().map(|(code, _)| code.clone()).collect())
    }

    fn list(&self, query: &ObservationQuery) -> Result<Vec<StoredObservation>, StoreError> {
        let state = self.lock()?;
        let mut rows: Vec<StoredObservation> = state
            .rows
            .values()
            .filter(|stored| {
                query
                    .trade_code
                    .as_deref()
                    .map_or(true, |code| stored.row.trade_code == code)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.row
                .date
                .cmp(&a.row.date)
                .then_with(|| a.row.trade_code.cmp(&b.row.trade_code))
        });

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(query.offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, date: &str) -> ObservationRow {
        ObservationRow {
            trade_code: code.to_string(),
            date: date.to_string(),
            open: 10.0,
            high: 11.0,
            low: 9.5,
            close: 10.5,
            volume: 1_000,
        }
    }

    #[test]
    fn rejects_duplicate_business_key() {
        let store = MemoryStore::new();
        store.insert(&row("ACI", "2020-01-02")).expect("first insert");
        let error = store
            .insert(&row("ACI", "2020-01-02"))
            .expect_err("duplicate must conflict");
        assert!(error.is_conflict());
        assert_eq!(store.count().expect("count"), 1);
    }

    #[test]
    fn failed_insert_does_not_consume_ordinal() {
        let store = MemoryStore::new();
        assert_eq!(store.insert(&row("ACI", "2020-01-02")).expect("insert"), 1);
        let _ = store.insert(&row("ACI", "2020-01-02"));
        assert_eq!(store.insert(&row("ACI", "2020-01-03")).expect("insert"), 2);
    }

    #[test]
    fn insert_many_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.insert(&row("GP", "2020-01-02")).expect("seed");

        let error = store
            .insert_many(&[row("ACI", "2020-01-02"), row("GP", "2020-01-02")])
            .expect_err("conflict");
        assert!(error.is_conflict());
        assert_eq!(store.count().expect("count"), 1);
    }

    #[test]
    fn reset_sequence_restarts_ordinals() {
        let store = MemoryStore::new();
        store
            .insert_many(&[row("ACI", "2020-01-02"), row("ACI", "2020-01-03")])
            .expect("insert");
        store.delete_all().expect("clear");
        store.reset_ordinal_sequence().expect("reset");

        assert_eq!(store.insert(&row("GP", "2020-01-02")).expect("insert"), 1);
    }

    #[test]
    fn list_orders_newest_first_and_pages() {
        let store = MemoryStore::new();
        store
            .insert_many(&[
                row("ACI", "2020-01-02"),
                row("GP", "2020-01-03"),
                row("ACI", "2020-01-03"),
            ])
            .expect("insert");

        let page = store
            .list(&ObservationQuery {
                trade_code: None,
                limit: Some(2),
                offset: 0,
            })
            .expect("list");
        let keys: Vec<_> = page.iter().map(|stored| stored.row.key()).collect();
        assert_eq!(
            keys,
            vec![
                ("ACI".to_string(), "2020-01-03".to_string()),
                ("GP".to_string(), "2020-01-03".to_string()),
            ]
        );

        let filtered = store
            .list(&ObservationQuery::for_trade_code("GP"))
            .expect("list");
        assert_eq!(filtered.len(), 1);
    }
}
