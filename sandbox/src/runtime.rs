//! VM runtime: Wasmtime engine, code management, and contract calls.
//!
//! `Vm` is the main entry point. Bytecode enters through `store_code`, which
//! validates it and hands it to the code cache. Every call then creates a
//! fresh Wasmtime instance wired to a new `HostState`, runs one entry point
//! under a fuel budget, and discards the instance.
//!
//! Gas for a call is `min(gas_limit, gas_meter.remaining())`. Wasmtime fuel
//! counts every operator; host functions and the result deserialization
//! charge the same fuel, so one counter covers the whole call. Whatever was
//! consumed is charged to the caller's `GasMeter` on every exit path.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use wasmtime::{Config, Engine, ExternType, Linker, Memory, Module, Store, Trap, TypedFunc};

use contractvm_hostapi::Backend;
use contractvm_primitives::codec::{from_json_slice, to_json_vec};
use contractvm_primitives::{
    Binary, Checksum, ContractResult, Env, GasMeter, MessageInfo, Reply, Response, UFraction,
};

use crate::cache::{CodeCache, Metrics};
use crate::config::VmConfig;
use crate::entry_points::EntryPoint;
use crate::error::{CallError, HostTrap, VmError};
use crate::host_impl::HostState;
use crate::linker::build_linker;
use crate::memory;
use crate::validation::{check_wasm_magic, exported_entry_points, required_capabilities, validate_module};

/// What a stored contract offers and needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisReport {
    pub entry_points: Vec<EntryPoint>,
    pub required_capabilities: BTreeSet<String>,
}

/// Successful call output and the gas it consumed.
pub type CallResult<T> = Result<(T, u64), CallError>;

/// The contract virtual machine. Shared across threads; every call takes
/// `&self`.
pub struct Vm {
    engine: Engine,
    linker: Linker<HostState>,
    cache: CodeCache,
    config: VmConfig,
}

impl Vm {
    pub fn new(config: VmConfig) -> Result<Self, VmError> {
        let engine = create_engine(&config)?;
        let linker = build_linker(&engine)?;
        let cache = CodeCache::new(engine.clone(), &config.cache_dir, config.memory_cache_size_bytes)?;
        tracing::debug!(
            target: "contractvm::vm",
            cache_dir = %config.cache_dir.display(),
            capabilities = ?config.available_capabilities,
            "vm created"
        );
        Ok(Self {
            engine,
            linker,
            cache,
            config,
        })
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    // ── Code management ──

    /// Validate and persist bytecode, returning its checksum.
    pub fn store_code(&self, wasm: &[u8]) -> Result<Checksum, VmError> {
        check_wasm_magic(wasm)?;
        let module = Module::new(&self.engine, wasm)
            .map_err(|e| VmError::ValidationError(format!("{e:#}")))?;
        validate_module(&module, &self.config.available_capabilities, self.config.memory_limit_pages)?;

        let checksum = Checksum::generate(wasm);
        self.cache.save_wasm(&checksum, wasm)?;
        self.cache.insert(checksum, module, wasm.len())?;
        tracing::debug!(target: "contractvm::vm", %checksum, size = wasm.len(), "code stored");
        Ok(checksum)
    }

    pub fn remove_code(&self, checksum: &Checksum) -> Result<(), VmError> {
        self.cache.remove_wasm(checksum)
    }

    pub fn get_code(&self, checksum: &Checksum) -> Result<Vec<u8>, VmError> {
        self.cache.load_wasm(checksum)
    }

    pub fn pin(&self, checksum: &Checksum) -> Result<(), VmError> {
        self.cache.pin(checksum)
    }

    pub fn unpin(&self, checksum: &Checksum) -> Result<(), VmError> {
        self.cache.unpin(checksum)
    }

    pub fn analyze_code(&self, checksum: &Checksum) -> Result<AnalysisReport, VmError> {
        let cached = self.cache.get(checksum)?;
        Ok(AnalysisReport {
            entry_points: exported_entry_points(&cached.module),
            required_capabilities: required_capabilities(&cached.module),
        })
    }

    pub fn metrics(&self) -> Result<Metrics, VmError> {
        self.cache.metrics()
    }

    // ── Calls ──

    #[allow(clippy::too_many_arguments)]
    pub fn instantiate(
        &self,
        checksum: &Checksum,
        env: &Env,
        info: &MessageInfo,
        msg: &[u8],
        backend: Backend,
        gas_meter: &mut GasMeter,
        gas_limit: u64,
        deserialization_cost: UFraction,
    ) -> CallResult<Response> {
        let args = vec![encode_arg(env)?, encode_arg(info)?, msg.to_vec()];
        self.call(EntryPoint::Instantiate, checksum, args, backend, gas_meter, gas_limit, deserialization_cost)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &self,
        checksum: &Checksum,
        env: &Env,
        info: &MessageInfo,
        msg: &[u8],
        backend: Backend,
        gas_meter: &mut GasMeter,
        gas_limit: u64,
        deserialization_cost: UFraction,
    ) -> CallResult<Response> {
        let args = vec![encode_arg(env)?, encode_arg(info)?, msg.to_vec()];
        self.call(EntryPoint::Execute, checksum, args, backend, gas_meter, gas_limit, deserialization_cost)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn query(
        &self,
        checksum: &Checksum,
        env: &Env,
        msg: &[u8],
        backend: Backend,
        gas_meter: &mut GasMeter,
        gas_limit: u64,
        deserialization_cost: UFraction,
    ) -> CallResult<Binary> {
        let args = vec![encode_arg(env)?, msg.to_vec()];
        self.call(EntryPoint::Query, checksum, args, backend, gas_meter, gas_limit, deserialization_cost)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn migrate(
        &self,
        checksum: &Checksum,
        env: &Env,
        msg: &[u8],
        backend: Backend,
        gas_meter: &mut GasMeter,
        gas_limit: u64,
        deserialization_cost: UFraction,
    ) -> CallResult<Response> {
        let args = vec![encode_arg(env)?, msg.to_vec()];
        self.call(EntryPoint::Migrate, checksum, args, backend, gas_meter, gas_limit, deserialization_cost)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sudo(
        &self,
        checksum: &Checksum,
        env: &Env,
        msg: &[u8],
        backend: Backend,
        gas_meter: &mut GasMeter,
        gas_limit: u64,
        deserialization_cost: UFraction,
    ) -> CallResult<Response> {
        let args = vec![encode_arg(env)?, msg.to_vec()];
        self.call(EntryPoint::Sudo, checksum, args, backend, gas_meter, gas_limit, deserialization_cost)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn reply(
        &self,
        checksum: &Checksum,
        env: &Env,
        reply: &Reply,
        backend: Backend,
        gas_meter: &mut GasMeter,
        gas_limit: u64,
        deserialization_cost: UFraction,
    ) -> CallResult<Response> {
        let args = vec![encode_arg(env)?, encode_arg(reply)?];
        self.call(EntryPoint::Reply, checksum, args, backend, gas_meter, gas_limit, deserialization_cost)
    }

    #[allow(clippy::too_many_arguments)]
    fn call<T: DeserializeOwned>(
        &self,
        entry_point: EntryPoint,
        checksum: &Checksum,
        args: Vec<Vec<u8>>,
        backend: Backend,
        gas_meter: &mut GasMeter,
        gas_limit: u64,
        deserialization_cost: UFraction,
    ) -> CallResult<T> {
        let cached = self.cache.get(checksum).map_err(|e| CallError::new(e, 0))?;
        if !matches!(cached.module.get_export(entry_point.name()), Some(ExternType::Func(_))) {
            return Err(CallError::new(
                VmError::UnsupportedEntryPoint(entry_point.name().into()),
                0,
            ));
        }

        let budget = gas_limit.min(gas_meter.remaining());
        if budget == 0 {
            return Err(CallError::new(VmError::OutOfGas, 0));
        }

        let state = HostState::new(
            backend,
            *checksum,
            self.config.gas_costs,
            self.config.execution.clone(),
            self.config.memory_limit_bytes(),
            self.config.print_debug,
        );
        let mut store = Store::new(&self.engine, state);
        store.limiter(|state| &mut state.limits);
        store
            .set_fuel(budget)
            .map_err(|e| CallError::new(VmError::Engine(e.to_string()), 0))?;

        let result = self.invoke::<T>(&mut store, &cached.module, entry_point, &args, deserialization_cost);

        let fuel_left = store.get_fuel().unwrap_or(0);
        store.data_mut().teardown();

        let gas_used = match result {
            Err(VmError::OutOfGas) => budget,
            _ => budget.saturating_sub(fuel_left),
        };
        let result = match gas_meter.charge(gas_used) {
            Ok(()) => result,
            Err(_) => Err(VmError::OutOfGas),
        };

        match &result {
            Ok(_) => tracing::debug!(
                target: "contractvm::vm",
                %checksum,
                %entry_point,
                gas_used,
                "call succeeded"
            ),
            Err(error) => tracing::debug!(
                target: "contractvm::vm",
                %checksum,
                %entry_point,
                gas_used,
                %error,
                "call failed"
            ),
        }
        result
            .map(|value| (value, gas_used))
            .map_err(|error| CallError::new(error, gas_used))
    }

    /// Run one entry point in a fresh instance and decode its result.
    fn invoke<T: DeserializeOwned>(
        &self,
        store: &mut Store<HostState>,
        module: &Module,
        entry_point: EntryPoint,
        args: &[Vec<u8>],
        deserialization_cost: UFraction,
    ) -> Result<T, VmError> {
        let instance = self
            .linker
            .instantiate(&mut *store, module)
            .map_err(|e| execution_error(store, e))?;
        let memory = instance
            .get_memory(&mut *store, "memory")
            .ok_or_else(|| VmError::RuntimeError("contract does not export memory".into()))?;
        let allocate = instance
            .get_typed_func::<u32, u32>(&mut *store, "allocate")
            .map_err(|e| VmError::RuntimeError(e.to_string()))?;

        let mut arg_ptrs = Vec::with_capacity(args.len());
        for arg in args {
            arg_ptrs.push(write_arg(store, &memory, &allocate, arg)?);
        }

        let result_ptr = match arg_ptrs.as_slice() {
            &[a, b] => instance
                .get_typed_func::<(u32, u32), u32>(&mut *store, entry_point.name())
                .map_err(|e| VmError::RuntimeError(e.to_string()))?
                .call(&mut *store, (a, b)),
            &[a, b, c] => instance
                .get_typed_func::<(u32, u32, u32), u32>(&mut *store, entry_point.name())
                .map_err(|e| VmError::RuntimeError(e.to_string()))?
                .call(&mut *store, (a, b, c)),
            other => {
                return Err(VmError::RuntimeError(format!(
                    "{entry_point} called with {} arguments",
                    other.len()
                )))
            }
        }
        .map_err(|e| execution_error(store, e))?;

        let max_len = store.data().config.max_result_len;
        let data = memory::read_region(memory.data(&*store), result_ptr, max_len)
            .map_err(|e| VmError::RuntimeError(e.to_string()))?;

        charge_fuel(store, deserialization_cost.apply(data.len()))?;
        let result: ContractResult<T> = from_json_slice(&data)
            .map_err(|e| VmError::RuntimeError(format!("invalid {entry_point} result: {e}")))?;
        result.into_result().map_err(VmError::ContractError)
    }
}

/// Create a Wasmtime engine with deterministic configuration.
fn create_engine(config: &VmConfig) -> Result<Engine, VmError> {
    let mut wasm_config = Config::new();

    // Fuel is the gas counter.
    wasm_config.consume_fuel(true);

    // Determinism
    wasm_config.wasm_threads(false);
    wasm_config.wasm_simd(false);
    wasm_config.wasm_relaxed_simd(false);
    wasm_config.wasm_multi_memory(false);
    wasm_config.cranelift_nan_canonicalization(true);

    let max_bytes = config.memory_limit_pages as u64 * crate::config::WASM_PAGE_SIZE;
    wasm_config.memory_guaranteed_dense_image_size(max_bytes.min(16 * 1024 * 1024));

    Engine::new(&wasm_config).map_err(|e| VmError::Engine(e.to_string()))
}

fn encode_arg<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, CallError> {
    to_json_vec(value).map_err(|e| CallError::new(VmError::RuntimeError(e.to_string()), 0))
}

/// Copy an argument into a region allocated by the contract.
fn write_arg(
    store: &mut Store<HostState>,
    memory: &Memory,
    allocate: &TypedFunc<u32, u32>,
    data: &[u8],
) -> Result<u32, VmError> {
    let len = u32::try_from(data.len())
        .map_err(|_| VmError::RuntimeError("argument does not fit in a region".into()))?;
    let region_ptr = allocate
        .call(&mut *store, len)
        .map_err(|e| execution_error(store, e))?;
    memory::write_region(memory.data_mut(&mut *store), region_ptr, data)
        .map_err(|e| VmError::RuntimeError(e.to_string()))?;
    Ok(region_ptr)
}

fn charge_fuel(store: &mut Store<HostState>, amount: u64) -> Result<(), VmError> {
    let fuel = store.get_fuel().map_err(|e| VmError::Engine(e.to_string()))?;
    let left = fuel.checked_sub(amount);
    store
        .set_fuel(left.unwrap_or(0))
        .map_err(|e| VmError::Engine(e.to_string()))?;
    match left {
        Some(_) => Ok(()),
        None => Err(VmError::OutOfGas),
    }
}

/// Classify an error raised while contract code runs. A runtime error with
/// no fuel left is reported as running out of gas. Result decoding does not
/// go through here.
fn execution_error(store: &Store<HostState>, err: anyhow::Error) -> VmError {
    match classify_trap(err) {
        VmError::RuntimeError(_) if store.get_fuel().unwrap_or(0) == 0 => VmError::OutOfGas,
        other => other,
    }
}

/// Map an error raised while running contract code to a `VmError`.
///
/// Host traps are typed; fuel exhaustion is `Trap::OutOfFuel`; everything
/// else the contract did (wasm traps, failed memory growth) is a runtime
/// error.
fn classify_trap(err: anyhow::Error) -> VmError {
    if let Some(trap) = err.downcast_ref::<HostTrap>() {
        return match trap {
            HostTrap::OutOfGas => VmError::OutOfGas,
            HostTrap::Runtime(msg) => VmError::RuntimeError(msg.clone()),
            HostTrap::Aborted(_) => VmError::RuntimeError(trap.to_string()),
        };
    }
    match err.downcast_ref::<Trap>() {
        Some(Trap::OutOfFuel) => VmError::OutOfGas,
        Some(trap) => VmError::RuntimeError(trap.to_string()),
        None => VmError::RuntimeError(format!("{err:#}")),
    }
}
