//! Per-call state held in the Wasmtime `Store`.
//!
//! `HostState` bundles the backend capabilities, the iterator registry,
//! the gas cost table, and the host-side limits for one contract call. It
//! is created fresh for every call and torn down before the result is
//! returned, so nothing a contract does leaks into the next call except
//! through storage.

use contractvm_hostapi::{
    Backend, ExecutionConfig, HostError, IteratorRegistry, KeyRange, Order, QuerierResult, Record,
};
use contractvm_primitives::{Checksum, GasCosts};
use wasmtime::{StoreLimits, StoreLimitsBuilder};

pub struct HostState {
    /// Storage, api, and querier for this call.
    pub backend: Backend,
    /// Iterators opened by `db_scan`; cleared on teardown.
    pub iterators: IteratorRegistry,
    pub gas_costs: GasCosts,
    pub config: ExecutionConfig,
    /// Memory growth limiter installed on the store.
    pub limits: StoreLimits,
    /// Code being executed, for log context.
    pub checksum: Checksum,
    pub print_debug: bool,
}

impl HostState {
    pub fn new(
        backend: Backend,
        checksum: Checksum,
        gas_costs: GasCosts,
        config: ExecutionConfig,
        memory_limit_bytes: usize,
        print_debug: bool,
    ) -> Self {
        let limits = StoreLimitsBuilder::new()
            .memory_size(memory_limit_bytes)
            .trap_on_grow_failure(true)
            .build();
        Self {
            backend,
            iterators: IteratorRegistry::new(config.max_iterators),
            gas_costs,
            config,
            limits,
            checksum,
            print_debug,
        }
    }

    fn check_key(&self, key: &[u8]) -> Result<(), HostError> {
        if key.len() > self.config.max_key_len {
            return Err(HostError::runtime(format!(
                "key too large: {} > {}",
                key.len(),
                self.config.max_key_len
            )));
        }
        Ok(())
    }

    pub fn db_read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HostError> {
        self.check_key(key)?;
        self.backend.storage.get(key)
    }

    pub fn db_write(&self, key: &[u8], value: &[u8]) -> Result<(), HostError> {
        self.check_key(key)?;
        if value.len() > self.config.max_value_len {
            return Err(HostError::runtime(format!(
                "value too large: {} > {}",
                value.len(),
                self.config.max_value_len
            )));
        }
        self.backend.storage.set(key, value)
    }

    pub fn db_remove(&self, key: &[u8]) -> Result<(), HostError> {
        self.check_key(key)?;
        self.backend.storage.remove(key)
    }

    pub fn db_scan(
        &mut self,
        start: Option<Vec<u8>>,
        end: Option<Vec<u8>>,
        order: i32,
    ) -> Result<u32, HostError> {
        let order = Order::try_from(order)?;
        self.iterators.open(KeyRange::new(start, end), order)
    }

    pub fn db_next(&mut self, iterator_id: u32) -> Result<Option<Record>, HostError> {
        self.iterators
            .next(iterator_id, self.backend.storage.as_ref())
    }

    pub fn query_chain(&self, request: &[u8], gas_limit: u64) -> (Result<QuerierResult, HostError>, u64) {
        self.backend.querier.query_raw(request, gas_limit)
    }

    pub fn debug(&self, message: &str) {
        if self.print_debug {
            tracing::debug!(target: "contractvm::contract", checksum = %self.checksum, "{message}");
        }
    }

    /// Release everything the call accumulated.
    pub fn teardown(&mut self) {
        self.iterators.clear();
    }
}
