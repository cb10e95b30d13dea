//! `contractvm-hostapi`: host interfaces for the contract VM sandbox.
//!
//! This crate defines what a running contract can reach outside its own
//! memory. It provides:
//!
//! - `Storage` trait: ordered key-value contract storage with `seek`
//! - `IteratorRegistry`: per-call lazy cursors behind `db_scan`/`db_next`
//! - `Api` and `Querier` traits, bundled per call as a `Backend`
//! - `MemStore`, `MockApi`, `MockQuerier`: in-memory backends for testing
//! - `ExecutionConfig`: host-side limits for a single call
//! - `HostError`: host-side error type with contract-visible codes

pub mod error;
pub mod types;
pub mod storage;
pub mod iterator;
pub mod mem_store;
pub mod traits;
pub mod mock;

// Re-export commonly used types at the crate root.
pub use error::HostError;
pub use types::ExecutionConfig;
pub use storage::{KeyRange, Order, Record, Storage};
pub use iterator::IteratorRegistry;
pub use mem_store::MemStore;
pub use traits::{Api, Backend, Querier, QuerierResult};
pub use mock::{mock_backend, MockApi, MockQuerier, WasmHandler};
