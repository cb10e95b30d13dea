//! Contract storage abstraction.
//!
//! `Storage` is an ordered bytes→bytes map scoped to one contract. The VM
//! only needs point reads/writes and a `seek` primitive; iterators are built
//! on top of `seek` by [`IteratorRegistry`](crate::iterator::IteratorRegistry)
//! so backends never hold per-call cursor state.
//!
//! Implementations:
//! - `MemStore` (this crate): in-memory BTreeMap for testing
//! - production backends are provided by the embedding chain

use crate::error::HostError;

/// A key/value pair as returned by range iteration.
pub type Record = (Vec<u8>, Vec<u8>);

/// Iteration direction. The repr values are the ones contracts pass to
/// `db_scan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Order {
    Ascending = 1,
    Descending = 2,
}

impl TryFrom<i32> for Order {
    type Error = HostError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Ascending),
            2 => Ok(Self::Descending),
            other => Err(HostError::runtime(format!("invalid iteration order: {other}"))),
        }
    }
}

/// Half-open key range `[start, end)`. A missing bound is unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Option<Vec<u8>>,
    pub end: Option<Vec<u8>>,
}

impl KeyRange {
    pub fn new(start: Option<Vec<u8>>, end: Option<Vec<u8>>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let above_start = self.start.as_deref().map_or(true, |s| key >= s);
        let below_end = self.end.as_deref().map_or(true, |e| key < e);
        above_start && below_end
    }
}

/// Abstraction over contract storage.
///
/// Methods take `&self`; implementations use interior mutability so that a
/// single backend can be shared by `Arc` between the caller and a running
/// call. Implementations must be deterministic: ordering is lexicographic
/// on key bytes.
pub trait Storage: Send + Sync {
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HostError>;

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), HostError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &[u8]) -> Result<(), HostError>;

    /// Return the first record in `range` that comes strictly after `after`
    /// in `order` (or the first record of the range when `after` is `None`).
    fn seek(
        &self,
        range: &KeyRange,
        order: Order,
        after: Option<&[u8]>,
    ) -> Result<Option<Record>, HostError>;

    /// Check if a key exists.
    ///
    /// Default implementation uses `get()`, but backends may optimize this.
    fn contains(&self, key: &[u8]) -> Result<bool, HostError> {
        Ok(self.get(key)?.is_some())
    }
}
