use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::parser::DrawAggregate;

/// Parsed draws keyed by date. Entries are never removed.
#[derive(Debug, Default)]
pub struct AggregateStore {
    entries: RwLock<BTreeMap<NaiveDate, Arc<DrawAggregate>>>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(data: BTreeMap<NaiveDate, DrawAggregate>) -> Self {
        let entries = data.into_iter().map(|(date, agg)| (date, Arc::new(agg))).collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<NaiveDate, Arc<DrawAggregate>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<NaiveDate, Arc<DrawAggregate>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has(&self, date: NaiveDate) -> bool {
        self.read().contains_key(&date)
    }

    pub fn get(&self, date: NaiveDate) -> Option<Arc<DrawAggregate>> {
        self.read().get(&date).cloned()
    }

    pub fn set(&self, date: NaiveDate, aggregate: DrawAggregate) {
        self.write().insert(date, Arc::new(aggregate));
    }

    /// Known dates, ascending.
    pub fn keys(&self) -> Vec<NaiveDate> {
        self.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Inserts a batch under one write lock, provided `still_current` holds
    /// once the lock is taken. Returns the number of entries written.
    pub fn commit_if<F>(&self, aggregates: Vec<DrawAggregate>, still_current: F) -> Option<usize>
    where
        F: FnOnce() -> bool,
    {
        let mut entries = self.write();
        if !still_current() {
            return None;
        }
        let count = aggregates.len();
        for aggregate in aggregates {
            entries.insert(aggregate.date, Arc::new(aggregate));
        }
        Some(count)
    }

    /// Owned copy of the contents, for persistence.
    pub fn snapshot(&self) -> BTreeMap<NaiveDate, DrawAggregate> {
        self.read()
            .iter()
            .map(|(date, agg)| (*date, DrawAggregate::clone(agg)))
            .collect()
    }
}
