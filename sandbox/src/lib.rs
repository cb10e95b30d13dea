//! `contractvm-sandbox`: Wasmtime-based VM for deterministic contract
//! execution.
//!
//! This crate stores, validates, and runs untrusted contract bytecode
//! inside a Wasmtime sandbox. It enforces:
//!
//! - **Determinism:** No SIMD, no threads, no multi-memory, NaN canonicalization
//! - **Gas metering:** Wasmtime fuel counts operators; host calls and result
//!   decoding charge the same counter
//! - **Memory limits:** Linear memory growth bounded per instance
//! - **Import whitelisting:** Only the `env` host functions, with exact
//!   signatures and capability gating
//! - **ABI validation:** Required exports and entry point signatures checked
//!   at `store_code`
//!
//! The primary entry point is [`Vm`].

pub mod cache;
pub mod config;
pub mod entry_points;
pub mod error;
pub mod host_impl;
pub mod linker;
pub mod memory;
pub mod runtime;
pub mod validation;

pub use cache::Metrics;
pub use config::{capabilities_from_csv, VmConfig};
pub use entry_points::EntryPoint;
pub use error::{CallError, VmError};
pub use runtime::{AnalysisReport, CallResult, Vm};
