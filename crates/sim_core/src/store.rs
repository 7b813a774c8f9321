//! In-memory state store with per-record locking.
//!
//! The key set of each table is fixed when the table is built, so lookups go
//! through an immutable map and only the record itself is locked. Two updates
//! to the same id are serialised; updates to different ids never contend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::error::StoreError;
use crate::records::{ModelMetric, Record, StrategyRecord};
use crate::registry;

/// A fixed-key table of records, each behind its own lock.
pub struct RecordTable<R> {
    /// Identifiers in insertion order
    order: Vec<String>,
    /// Record slots by identifier
    slots: HashMap<String, Mutex<R>>,
}

impl<R: Record> RecordTable<R> {
    /// Build a table from seed records. Later duplicates of an id are ignored.
    pub fn new(records: impl IntoIterator<Item = R>) -> Self {
        let mut order = Vec::new();
        let mut slots = HashMap::new();

        for mut record in records {
            let id = record.id().to_string();
            if slots.contains_key(&id) {
                warn!(kind = %R::KIND, id = %id, "Ignoring duplicate record id");
                continue;
            }
            record.enforce_invariants();
            order.push(id.clone());
            slots.insert(id, Mutex::new(record));
        }

        Self { order, slots }
    }

    /// Read the current value of a record
    pub fn get(&self, id: &str) -> Result<R, StoreError> {
        Ok(self.lock(id)?.clone())
    }

    /// Apply `mutator` under exclusive access and return the new value.
    ///
    /// The record's invariants are re-established before the lock is released.
    pub fn update<F>(&self, id: &str, mutator: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut R),
    {
        let mut guard = self.lock(id)?;
        mutator(&mut guard);
        guard.enforce_invariants();
        Ok(guard.clone())
    }

    /// Current value of every record, in insertion order
    pub fn snapshot(&self) -> Vec<R> {
        self.order
            .iter()
            .filter_map(|id| self.get(id).ok())
            .collect()
    }

    /// Identifiers in insertion order
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Whether `id` is present
    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the table has no records
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn lock(&self, id: &str) -> Result<MutexGuard<'_, R>, StoreError> {
        let slot = self
            .slots
            .get(id)
            .ok_or_else(|| StoreError::not_found(R::KIND, id))?;

        match slot.lock() {
            Ok(guard) => Ok(guard),
            Err(poisoned) => {
                // A mutator panicked mid-update; repair the record and carry on.
                warn!(kind = %R::KIND, id = %id, "Recovering poisoned record lock");
                let mut guard = poisoned.into_inner();
                guard.enforce_invariants();
                slot.clear_poison();
                Ok(guard)
            }
        }
    }
}

/// Owner of all mutable simulation state.
///
/// Built once at startup and shared by `Arc`; there is no global instance.
pub struct StateStore {
    strategies: RecordTable<StrategyRecord>,
    models: RecordTable<ModelMetric>,
}

impl StateStore {
    /// Create a store from explicit seed records
    pub fn new(
        strategies: impl IntoIterator<Item = StrategyRecord>,
        models: impl IntoIterator<Item = ModelMetric>,
    ) -> Self {
        Self {
            strategies: RecordTable::new(strategies),
            models: RecordTable::new(models),
        }
    }

    /// Create a store seeded from the fixed registries
    pub fn with_defaults() -> Self {
        Self::new(registry::default_strategies(), registry::default_models())
    }

    /// Strategy table
    pub fn strategies(&self) -> &RecordTable<StrategyRecord> {
        &self.strategies
    }

    /// Model metric table
    pub fn models(&self) -> &RecordTable<ModelMetric> {
        &self.models
    }

    /// Set a strategy to active (`enabled`) or inactive.
    pub fn toggle_strategy(&self, id: &str, enabled: bool) -> Result<StrategyRecord, StoreError> {
        self.strategies.update(id, |record| record.set_enabled(enabled))
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}
