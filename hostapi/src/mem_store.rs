//! In-memory contract storage for testing.
//!
//! `MemStore` implements `Storage` using a `BTreeMap` for deterministic
//! key ordering. Useful for unit tests and integration tests where a real
//! storage backend is not needed.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::HostError;
use crate::storage::{KeyRange, Order, Record, Storage};

/// In-memory storage backed by `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with data.
    pub fn with_data(data: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns the number of entries in the store.
    pub fn len(&self) -> usize {
        self.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the full contents, in key order.
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.read().map(|d| d.clone()).unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>, HostError> {
        self.data
            .read()
            .map_err(|_| HostError::internal("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>, HostError> {
        self.data
            .write()
            .map_err(|_| HostError::internal("memory store lock poisoned"))
    }
}

impl Storage for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HostError> {
        Ok(self.read()?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), HostError> {
        self.write()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<(), HostError> {
        self.write()?.remove(key);
        Ok(())
    }

    fn seek(
        &self,
        range: &KeyRange,
        order: Order,
        after: Option<&[u8]>,
    ) -> Result<Option<Record>, HostError> {
        let data = self.read()?;
        let start = range.start.as_deref();
        let end = range.end.as_deref();

        let found = match order {
            Order::Ascending => {
                // Lower bound is the later of `start` (inclusive) and `after` (exclusive).
                let lower = match (start, after) {
                    (Some(s), Some(a)) if a >= s => Bound::Excluded(a),
                    (Some(s), _) => Bound::Included(s),
                    (None, Some(a)) => Bound::Excluded(a),
                    (None, None) => Bound::Unbounded,
                };
                data.range::<[u8], _>((lower, Bound::Unbounded))
                    .next()
                    .filter(|(k, _)| end.map_or(true, |e| k.as_slice() < e))
            }
            Order::Descending => {
                // Upper bound is the earlier of `end` (exclusive) and `after` (exclusive).
                let upper = match (end, after) {
                    (Some(e), Some(a)) if a < e => Bound::Excluded(a),
                    (Some(e), _) => Bound::Excluded(e),
                    (None, Some(a)) => Bound::Excluded(a),
                    (None, None) => Bound::Unbounded,
                };
                data.range::<[u8], _>((Bound::Unbounded, upper))
                    .next_back()
                    .filter(|(k, _)| start.map_or(true, |s| k.as_slice() >= s))
            }
        };
        Ok(found.map(|(k, v)| (k.clone(), v.clone())))
    }

    fn contains(&self, key: &[u8]) -> Result<bool, HostError> {
        Ok(self.read()?.contains_key(key))
    }
}
