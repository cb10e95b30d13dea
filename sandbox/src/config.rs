//! VM configuration.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use contractvm_hostapi::ExecutionConfig;
use contractvm_primitives::GasCosts;

/// Size of one wasm page in bytes.
pub const WASM_PAGE_SIZE: u64 = 65_536;

/// Configuration for a [`Vm`](crate::Vm).
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Directory holding persisted bytecode under `wasm/`.
    pub cache_dir: PathBuf,

    /// Capabilities the chain provides. Contracts declaring a capability
    /// outside this set are rejected at `store_code`.
    pub available_capabilities: BTreeSet<String>,

    /// Maximum linear memory pages per instance (1 page = 64 KiB).
    /// Default: 512 pages = 32 MiB.
    pub memory_limit_pages: u32,

    /// Budget for compiled modules kept in memory (excluding pinned ones).
    /// Default: 100 MiB.
    pub memory_cache_size_bytes: usize,

    /// Host call cost table.
    pub gas_costs: GasCosts,

    /// Host-side limits (key/value sizes, iterators, result size).
    pub execution: ExecutionConfig,

    /// Log contract `debug` messages through `tracing`.
    pub print_debug: bool,
}

impl VmConfig {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            available_capabilities: BTreeSet::new(),
            memory_limit_pages: 512,
            memory_cache_size_bytes: 100 * 1024 * 1024,
            gas_costs: GasCosts::default(),
            execution: ExecutionConfig::default(),
            print_debug: false,
        }
    }

    /// Set capabilities from a comma separated list such as
    /// `"staking,stargate,iterator"`.
    pub fn with_capabilities(mut self, csv: &str) -> Self {
        self.available_capabilities = capabilities_from_csv(csv);
        self
    }

    pub fn with_memory_limit_pages(mut self, pages: u32) -> Self {
        self.memory_limit_pages = pages;
        self
    }

    pub fn with_memory_cache_size(mut self, bytes: usize) -> Self {
        self.memory_cache_size_bytes = bytes;
        self
    }

    pub fn with_gas_costs(mut self, gas_costs: GasCosts) -> Self {
        self.gas_costs = gas_costs;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_print_debug(mut self, print_debug: bool) -> Self {
        self.print_debug = print_debug;
        self
    }

    /// Memory limit in bytes, as enforced by the store limiter.
    pub fn memory_limit_bytes(&self) -> usize {
        (self.memory_limit_pages as u64 * WASM_PAGE_SIZE) as usize
    }
}

/// Parse a comma separated capability list. Whitespace around entries is
/// ignored, as are empty entries.
pub fn capabilities_from_csv(csv: &str) -> BTreeSet<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}
