//! VM error types.

use contractvm_hostapi::HostError;
use contractvm_primitives::Checksum;

/// Top-level error type for the VM.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Bytecode rejected by `store_code` (malformed, forbidden features,
    /// ABI mismatch, missing capabilities).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// No code stored under this checksum.
    #[error("code not found: {checksum}")]
    NotFound { checksum: Checksum },

    /// The contract does not export the requested entry point.
    #[error("unsupported entry point: {0}")]
    UnsupportedEntryPoint(String),

    /// The call ran out of gas (own execution, host calls, nested queries,
    /// or result deserialization).
    #[error("out of gas")]
    OutOfGas,

    /// The contract trapped, aborted, broke a host rule, or produced output
    /// that could not be decoded.
    #[error("runtime error: {0}")]
    RuntimeError(String),

    /// The contract returned `{"error": msg}`.
    #[error("contract error: {0}")]
    ContractError(String),

    /// The persisted code store failed (I/O or integrity).
    #[error("cache error: {0}")]
    Cache(String),

    /// Wasmtime engine setup failed.
    #[error("engine error: {0}")]
    Engine(String),
}

impl VmError {
    pub fn not_found(checksum: Checksum) -> Self {
        Self::NotFound { checksum }
    }
}

/// A failed call together with the gas it consumed. The gas has already
/// been charged to the caller's meter.
#[derive(Debug, thiserror::Error)]
#[error("{error} (gas used: {gas_used})")]
pub struct CallError {
    #[source]
    pub error: VmError,
    pub gas_used: u64,
}

impl CallError {
    pub fn new(error: VmError, gas_used: u64) -> Self {
        Self { error, gas_used }
    }
}

/// Errors raised from host functions to stop the running contract.
///
/// They travel through wasmtime as `wasmtime::Error` and are downcast back
/// when the call result is classified.
#[derive(Debug, thiserror::Error)]
pub enum HostTrap {
    #[error("out of gas")]
    OutOfGas,

    #[error("{0}")]
    Runtime(String),

    #[error("Aborted: {0}")]
    Aborted(String),
}

impl From<HostError> for HostTrap {
    fn from(err: HostError) -> Self {
        Self::Runtime(err.to_string())
    }
}
