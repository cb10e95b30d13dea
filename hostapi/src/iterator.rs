//! Per-call iterator registry backing `db_scan` / `db_next`.
//!
//! Iterators are lazy cursors: each remembers its range, direction, and the
//! last key it returned, and asks the storage for the next record on demand.
//! Ids are 1-based and only meaningful within the call that opened them; the
//! registry is cleared when the call ends.

use crate::error::HostError;
use crate::storage::{KeyRange, Order, Record, Storage};

#[derive(Debug)]
struct Cursor {
    range: KeyRange,
    order: Order,
    last_key: Option<Vec<u8>>,
    done: bool,
}

#[derive(Debug)]
pub struct IteratorRegistry {
    cursors: Vec<Cursor>,
    max_iterators: usize,
}

impl IteratorRegistry {
    pub fn new(max_iterators: usize) -> Self {
        Self {
            cursors: Vec::new(),
            max_iterators,
        }
    }

    /// Open a cursor and return its id (starting at 1).
    pub fn open(&mut self, range: KeyRange, order: Order) -> Result<u32, HostError> {
        if self.cursors.len() >= self.max_iterators {
            return Err(HostError::runtime(format!(
                "too many iterators: limit {}",
                self.max_iterators
            )));
        }
        self.cursors.push(Cursor {
            range,
            order,
            last_key: None,
            done: false,
        });
        u32::try_from(self.cursors.len())
            .map_err(|_| HostError::runtime("iterator id overflow"))
    }

    /// Advance cursor `id`. `Ok(None)` once the range is exhausted; further
    /// calls keep returning `Ok(None)`.
    pub fn next(&mut self, id: u32, storage: &dyn Storage) -> Result<Option<Record>, HostError> {
        let cursor = id
            .checked_sub(1)
            .and_then(|idx| self.cursors.get_mut(idx as usize))
            .ok_or_else(|| HostError::runtime(format!("iterator {id} does not exist")))?;
        if cursor.done {
            return Ok(None);
        }
        let record = storage.seek(&cursor.range, cursor.order, cursor.last_key.as_deref())?;
        match &record {
            Some((key, _)) => cursor.last_key = Some(key.clone()),
            None => cursor.done = true,
        }
        Ok(record)
    }

    /// Drop all cursors. Called on call teardown.
    pub fn clear(&mut self) {
        self.cursors.clear();
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
