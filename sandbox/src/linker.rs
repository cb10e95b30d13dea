//! Host function registration via Wasmtime linker.
//!
//! Registers the `env` host functions with the Wasmtime `Linker`. The
//! linker is built once per `Vm` and reused for every instance. Each
//! function:
//! 1. Reads its inputs from contract regions (length-bounded)
//! 2. Charges gas from the store's fuel before doing any work
//! 3. Performs the operation through the call's `HostState`
//! 4. Writes results into a region obtained from the contract's `allocate`
//!
//! Gas exhaustion and host rule violations trap with a [`HostTrap`]; crypto
//! and address failures are returned to the contract as values.

use wasmtime::{Caller, Engine, Linker, Memory};

use contractvm_hostapi::HostError;
use contractvm_primitives::codec::{encode_record, to_json_vec};
use contractvm_primitives::crypto::{
    ECDSA_SIGNATURE_LEN, ECDSA_UNCOMPRESSED_PUBKEY_LEN, EDDSA_PUBKEY_LEN, EDDSA_SIGNATURE_LEN,
    SHA256_HASH_LEN,
};
use contractvm_primitives::types::MAX_ED25519_MESSAGE_LEN;
use contractvm_primitives::{Binary, SystemError, SystemResult};

use crate::error::{HostTrap, VmError};
use crate::host_impl::HostState;
use crate::memory;
use crate::validation::IMPORT_MODULE;

/// Build a linker with every host function registered.
pub fn build_linker(engine: &Engine) -> Result<Linker<HostState>, VmError> {
    let mut linker = Linker::new(engine);
    register_host_functions(&mut linker).map_err(|e| VmError::Engine(e.to_string()))?;
    Ok(linker)
}

fn register_host_functions(linker: &mut Linker<HostState>) -> anyhow::Result<()> {
    linker.func_wrap(IMPORT_MODULE, "db_read", db_read)?;
    linker.func_wrap(IMPORT_MODULE, "db_write", db_write)?;
    linker.func_wrap(IMPORT_MODULE, "db_remove", db_remove)?;
    linker.func_wrap(IMPORT_MODULE, "db_scan", db_scan)?;
    linker.func_wrap(IMPORT_MODULE, "db_next", db_next)?;
    linker.func_wrap(IMPORT_MODULE, "addr_validate", addr_validate)?;
    linker.func_wrap(IMPORT_MODULE, "addr_canonicalize", addr_canonicalize)?;
    linker.func_wrap(IMPORT_MODULE, "addr_humanize", addr_humanize)?;
    linker.func_wrap(IMPORT_MODULE, "secp256k1_verify", secp256k1_verify)?;
    linker.func_wrap(IMPORT_MODULE, "ed25519_verify", ed25519_verify)?;
    linker.func_wrap(IMPORT_MODULE, "debug", debug)?;
    linker.func_wrap(IMPORT_MODULE, "query_chain", query_chain)?;
    linker.func_wrap(IMPORT_MODULE, "abort", abort)?;
    Ok(())
}

// ── Helpers ──

/// Turn a fatal host error into a trap.
fn trap(err: HostError) -> anyhow::Error {
    if let HostError::Internal(msg) = &err {
        tracing::warn!(target: "contractvm::host", error = %msg, "backend failure");
    }
    HostTrap::from(err).into()
}

fn get_memory(caller: &mut Caller<'_, HostState>) -> anyhow::Result<Memory> {
    caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| HostTrap::Runtime("contract does not export memory".into()).into())
}

/// Deduct `amount` from the store's fuel. Running out leaves the fuel at
/// zero and traps.
pub(crate) fn charge(caller: &mut Caller<'_, HostState>, amount: u64) -> anyhow::Result<()> {
    let fuel = caller.get_fuel()?;
    match fuel.checked_sub(amount) {
        Some(left) => caller.set_fuel(left),
        None => {
            caller.set_fuel(0)?;
            Err(HostTrap::OutOfGas.into())
        }
    }
}

fn read_region(caller: &mut Caller<'_, HostState>, ptr: u32, max_len: usize) -> anyhow::Result<Vec<u8>> {
    let mem = get_memory(caller)?;
    memory::read_region(mem.data(&*caller), ptr, max_len).map_err(trap)
}

fn write_region(caller: &mut Caller<'_, HostState>, ptr: u32, data: &[u8]) -> anyhow::Result<()> {
    let mem = get_memory(caller)?;
    memory::write_region(mem.data_mut(&mut *caller), ptr, data).map_err(trap)
}

/// Allocate a region in the contract through its `allocate` export, fill
/// it with `data`, and return the region pointer.
fn write_to_contract(caller: &mut Caller<'_, HostState>, data: &[u8]) -> anyhow::Result<u32> {
    let len = u32::try_from(data.len())
        .map_err(|_| trap(HostError::runtime("result does not fit in a region")))?;
    let allocate = caller
        .get_export("allocate")
        .and_then(|e| e.into_func())
        .ok_or_else(|| anyhow::Error::from(HostTrap::Runtime("contract does not export allocate".into())))?
        .typed::<u32, u32>(&*caller)?;
    let region_ptr = allocate.call(&mut *caller, len)?;
    write_region(caller, region_ptr, data)?;
    Ok(region_ptr)
}

/// Return a non-fatal error to the contract as a message region.
fn error_to_contract(caller: &mut Caller<'_, HostState>, err: HostError) -> anyhow::Result<u32> {
    if err.is_fatal() {
        return Err(trap(err));
    }
    write_to_contract(caller, err.to_string().as_bytes())
}

fn verification_result(result: Result<bool, HostError>) -> anyhow::Result<u32> {
    match result {
        Ok(true) => Ok(0),
        Ok(false) => Ok(1),
        Err(e) if e.is_fatal() => Err(trap(e)),
        Err(e) => Ok(e.to_error_code() as u32),
    }
}

fn utf8(bytes: Vec<u8>) -> Result<String, HostError> {
    String::from_utf8(bytes).map_err(|_| HostError::user("Input is not valid UTF-8"))
}

// ── Storage ──

fn db_read(mut caller: Caller<'_, HostState>, key_ptr: u32) -> anyhow::Result<u32> {
    let max_key_len = caller.data().config.max_key_len;
    let key = read_region(&mut caller, key_ptr, max_key_len)?;
    let cost = caller.data().gas_costs.db_read_cost(key.len());
    charge(&mut caller, cost)?;

    let value = caller.data().db_read(&key).map_err(trap)?;
    tracing::trace!(target: "contractvm::host", key_len = key.len(), found = value.is_some(), "db_read");
    match value {
        None => Ok(0),
        Some(value) => {
            let cost = caller.data().gas_costs.with_bytes(0, value.len());
            charge(&mut caller, cost)?;
            write_to_contract(&mut caller, &value)
        }
    }
}

fn db_write(mut caller: Caller<'_, HostState>, key_ptr: u32, value_ptr: u32) -> anyhow::Result<()> {
    let (max_key_len, max_value_len) = {
        let config = &caller.data().config;
        (config.max_key_len, config.max_value_len)
    };
    let key = read_region(&mut caller, key_ptr, max_key_len)?;
    let value = read_region(&mut caller, value_ptr, max_value_len)?;
    let cost = caller.data().gas_costs.db_write_cost(key.len(), value.len());
    charge(&mut caller, cost)?;

    tracing::trace!(target: "contractvm::host", key_len = key.len(), value_len = value.len(), "db_write");
    caller.data().db_write(&key, &value).map_err(trap)
}

fn db_remove(mut caller: Caller<'_, HostState>, key_ptr: u32) -> anyhow::Result<()> {
    let max_key_len = caller.data().config.max_key_len;
    let key = read_region(&mut caller, key_ptr, max_key_len)?;
    let cost = caller.data().gas_costs.db_remove_cost(key.len());
    charge(&mut caller, cost)?;

    tracing::trace!(target: "contractvm::host", key_len = key.len(), "db_remove");
    caller.data().db_remove(&key).map_err(trap)
}

fn db_scan(mut caller: Caller<'_, HostState>, start_ptr: u32, end_ptr: u32, order: i32) -> anyhow::Result<u32> {
    let max_key_len = caller.data().config.max_key_len;
    let start = match start_ptr {
        0 => None,
        ptr => Some(read_region(&mut caller, ptr, max_key_len)?),
    };
    let end = match end_ptr {
        0 => None,
        ptr => Some(read_region(&mut caller, ptr, max_key_len)?),
    };
    let cost = caller.data().gas_costs.db_scan_cost(
        start.as_ref().map_or(0, Vec::len),
        end.as_ref().map_or(0, Vec::len),
    );
    charge(&mut caller, cost)?;

    let id = caller.data_mut().db_scan(start, end, order).map_err(trap)?;
    tracing::trace!(target: "contractvm::host", iterator_id = id, order, "db_scan");
    Ok(id)
}

fn db_next(mut caller: Caller<'_, HostState>, iterator_id: u32) -> anyhow::Result<u32> {
    let cost = caller.data().gas_costs.db_next;
    charge(&mut caller, cost)?;

    let record = caller.data_mut().db_next(iterator_id).map_err(trap)?;
    tracing::trace!(target: "contractvm::host", iterator_id, done = record.is_none(), "db_next");
    match record {
        None => Ok(0),
        Some((key, value)) => {
            let encoded = encode_record(&key, &value);
            let cost = caller.data().gas_costs.with_bytes(0, encoded.len());
            charge(&mut caller, cost)?;
            write_to_contract(&mut caller, &encoded)
        }
    }
}

// ── Addresses ──

fn addr_validate(mut caller: Caller<'_, HostState>, source_ptr: u32) -> anyhow::Result<u32> {
    let max_len = caller.data().config.max_address_len;
    let source = read_region(&mut caller, source_ptr, max_len)?;
    let cost = caller.data().gas_costs.addr_validate;
    charge(&mut caller, cost)?;

    let outcome = utf8(source).and_then(|human| caller.data().backend.api.addr_validate(&human));
    match outcome {
        Ok(()) => Ok(0),
        Err(e) => error_to_contract(&mut caller, e),
    }
}

fn addr_canonicalize(mut caller: Caller<'_, HostState>, source_ptr: u32, dest_ptr: u32) -> anyhow::Result<u32> {
    let max_len = caller.data().config.max_address_len;
    let source = read_region(&mut caller, source_ptr, max_len)?;
    let cost = caller.data().gas_costs.addr_canonicalize;
    charge(&mut caller, cost)?;

    let outcome =
        utf8(source).and_then(|human| caller.data().backend.api.addr_canonicalize(&human));
    match outcome {
        Ok(canonical) => {
            write_region(&mut caller, dest_ptr, &canonical)?;
            Ok(0)
        }
        Err(e) => error_to_contract(&mut caller, e),
    }
}

fn addr_humanize(mut caller: Caller<'_, HostState>, source_ptr: u32, dest_ptr: u32) -> anyhow::Result<u32> {
    let max_len = caller.data().config.max_address_len;
    let source = read_region(&mut caller, source_ptr, max_len)?;
    let cost = caller.data().gas_costs.addr_humanize;
    charge(&mut caller, cost)?;

    let outcome = caller.data().backend.api.addr_humanize(&source);
    match outcome {
        Ok(human) => {
            write_region(&mut caller, dest_ptr, human.as_bytes())?;
            Ok(0)
        }
        Err(e) => error_to_contract(&mut caller, e),
    }
}

// ── Crypto ──

fn secp256k1_verify(mut caller: Caller<'_, HostState>, hash_ptr: u32, sig_ptr: u32, pubkey_ptr: u32) -> anyhow::Result<u32> {
    let hash = read_region(&mut caller, hash_ptr, SHA256_HASH_LEN)?;
    let signature = read_region(&mut caller, sig_ptr, ECDSA_SIGNATURE_LEN)?;
    let pubkey = read_region(&mut caller, pubkey_ptr, ECDSA_UNCOMPRESSED_PUBKEY_LEN)?;
    let cost = caller.data().gas_costs.secp256k1_verify;
    charge(&mut caller, cost)?;

    let result = caller.data().backend.api.secp256k1_verify(&hash, &signature, &pubkey);
    tracing::trace!(target: "contractvm::host", valid = matches!(result, Ok(true)), "secp256k1_verify");
    verification_result(result)
}

fn ed25519_verify(mut caller: Caller<'_, HostState>, msg_ptr: u32, sig_ptr: u32, pubkey_ptr: u32) -> anyhow::Result<u32> {
    let message = read_region(&mut caller, msg_ptr, MAX_ED25519_MESSAGE_LEN)?;
    let signature = read_region(&mut caller, sig_ptr, EDDSA_SIGNATURE_LEN)?;
    let pubkey = read_region(&mut caller, pubkey_ptr, EDDSA_PUBKEY_LEN)?;
    let cost = caller.data().gas_costs.ed25519_verify_cost(message.len());
    charge(&mut caller, cost)?;

    let result = caller.data().backend.api.ed25519_verify(&message, &signature, &pubkey);
    tracing::trace!(target: "contractvm::host", valid = matches!(result, Ok(true)), "ed25519_verify");
    verification_result(result)
}

// ── Debug, queries, abort ──

fn debug(mut caller: Caller<'_, HostState>, msg_ptr: u32) -> anyhow::Result<()> {
    let max_len = caller.data().config.max_debug_len;
    let message = read_region(&mut caller, msg_ptr, max_len)?;
    let cost = caller.data().gas_costs.debug_cost(message.len());
    charge(&mut caller, cost)?;

    caller.data().debug(&String::from_utf8_lossy(&message));
    Ok(())
}

fn query_chain(mut caller: Caller<'_, HostState>, request_ptr: u32) -> anyhow::Result<u32> {
    let max_len = caller.data().config.max_query_request_len;
    let request = read_region(&mut caller, request_ptr, max_len)?;
    let cost = caller.data().gas_costs.query_chain_cost(request.len());
    charge(&mut caller, cost)?;

    // The querier may spend at most what this call has left.
    let remaining = caller.get_fuel()?;
    let (result, gas_used) = caller.data().query_chain(&request, remaining);
    tracing::trace!(target: "contractvm::host", gas_limit = remaining, gas_used, "query_chain");
    charge(&mut caller, gas_used)?;

    let result = match result {
        Ok(result) => result,
        Err(e) if e.is_fatal() => return Err(trap(e)),
        Err(e) => SystemResult::Err(SystemError::InvalidRequest {
            error: e.to_string(),
            request: Binary(request),
        }),
    };
    let encoded = to_json_vec(&result).map_err(|e| trap(HostError::internal(e.to_string())))?;
    write_to_contract(&mut caller, &encoded)
}

fn abort(mut caller: Caller<'_, HostState>, msg_ptr: u32) -> anyhow::Result<()> {
    let max_len = caller.data().config.max_debug_len;
    let message = read_region(&mut caller, msg_ptr, max_len)?;
    let message = String::from_utf8_lossy(&message).into_owned();
    tracing::debug!(target: "contractvm::host", checksum = %caller.data().checksum, %message, "contract aborted");
    Err(HostTrap::Aborted(message).into())
}
