//! Contract validation: ABI compatibility checks run by `store_code`.
//!
//! Checks, in order:
//!
//! 1. Exactly one memory, exported as `memory`, within the page limit
//! 2. Required exports present with correct signatures
//! 3. Entry points, where exported, have the right signature
//! 4. Only known `env` functions are imported, with exact signatures,
//!    and capability-gated imports only when the capability is available
//! 5. Every `requires_<capability>` export names an available capability
//!
//! Forbidden wasm features (threads, SIMD, multi-memory) are rejected
//! earlier, when the engine compiles the module.

use std::collections::BTreeSet;

use wasmtime::{ExternType, FuncType, Module, ValType};

use crate::entry_points::EntryPoint;
use crate::error::VmError;

/// Module name all host functions are imported from.
pub const IMPORT_MODULE: &str = "env";

/// Prefix of exports declaring a required capability.
pub const REQUIRES_PREFIX: &str = "requires_";

/// Capability that enables `db_scan` / `db_next`.
pub const ITERATOR_CAPABILITY: &str = "iterator";

const WASM_MAGIC: &[u8; 4] = b"\0asm";

/// Required exports: (name, i32 param count, i32 result count).
const REQUIRED_EXPORTS: &[(&str, usize, usize)] = &[
    ("allocate", 1, 1),
    ("deallocate", 1, 0),
    ("interface_version_1", 0, 0),
];

/// Host functions: (name, i32 param count, i32 result count, capability).
pub const HOST_FUNCTIONS: &[(&str, usize, usize, Option<&str>)] = &[
    ("db_read", 1, 1, None),
    ("db_write", 2, 0, None),
    ("db_remove", 1, 0, None),
    ("db_scan", 3, 1, Some(ITERATOR_CAPABILITY)),
    ("db_next", 1, 1, Some(ITERATOR_CAPABILITY)),
    ("addr_validate", 1, 1, None),
    ("addr_canonicalize", 2, 1, None),
    ("addr_humanize", 2, 1, None),
    ("secp256k1_verify", 3, 1, None),
    ("ed25519_verify", 3, 1, None),
    ("debug", 1, 0, None),
    ("query_chain", 1, 1, None),
    ("abort", 1, 0, None),
];

/// Reject anything that is not a binary wasm module before compiling.
pub fn check_wasm_magic(wasm: &[u8]) -> Result<(), VmError> {
    if wasm.len() < WASM_MAGIC.len() || &wasm[..4] != WASM_MAGIC {
        return Err(VmError::ValidationError(
            "bytecode is not a wasm binary (bad magic)".into(),
        ));
    }
    Ok(())
}

/// Validate a compiled module against the contract ABI.
pub fn validate_module(
    module: &Module,
    available_capabilities: &BTreeSet<String>,
    memory_limit_pages: u32,
) -> Result<(), VmError> {
    validate_memory(module, memory_limit_pages)?;
    validate_exports(module)?;
    validate_entry_points(module)?;
    validate_imports(module, available_capabilities)?;
    validate_capabilities(module, available_capabilities)?;
    Ok(())
}

/// Capabilities declared through `requires_<capability>` exports.
pub fn required_capabilities(module: &Module) -> BTreeSet<String> {
    module
        .exports()
        .filter_map(|e| e.name().strip_prefix(REQUIRES_PREFIX))
        .filter(|cap| !cap.is_empty())
        .map(String::from)
        .collect()
}

/// Entry points the module exports, in canonical order.
pub fn exported_entry_points(module: &Module) -> Vec<EntryPoint> {
    EntryPoint::ALL
        .into_iter()
        .filter(|ep| module.get_export(ep.name()).is_some())
        .collect()
}

fn is_i32_signature(ty: &FuncType, params: usize, results: usize) -> bool {
    let p: Vec<ValType> = ty.params().collect();
    let r: Vec<ValType> = ty.results().collect();
    p.len() == params
        && r.len() == results
        && p.iter().chain(r.iter()).all(|v| matches!(v, ValType::I32))
}

fn validate_memory(module: &Module, memory_limit_pages: u32) -> Result<(), VmError> {
    let memories: Vec<_> = module
        .exports()
        .filter_map(|e| match e.ty() {
            ExternType::Memory(mt) => Some((e.name().to_string(), mt)),
            _ => None,
        })
        .collect();

    let (name, ty) = match memories.as_slice() {
        [single] => single,
        [] => {
            return Err(VmError::ValidationError(
                "module must export exactly one memory, found none".into(),
            ))
        }
        _ => {
            return Err(VmError::ValidationError(format!(
                "module must export exactly one memory, found {}",
                memories.len()
            )))
        }
    };
    if name != "memory" {
        return Err(VmError::ValidationError(format!(
            "memory must be exported as 'memory', found '{name}'"
        )));
    }
    if ty.minimum() > u64::from(memory_limit_pages) {
        return Err(VmError::ValidationError(format!(
            "initial memory of {} pages exceeds limit of {memory_limit_pages}",
            ty.minimum()
        )));
    }
    Ok(())
}

fn validate_exports(module: &Module) -> Result<(), VmError> {
    for &(name, params, results) in REQUIRED_EXPORTS {
        let export = module
            .get_export(name)
            .ok_or_else(|| VmError::ValidationError(format!("missing required export: {name}")))?;
        let ExternType::Func(ty) = export else {
            return Err(VmError::ValidationError(format!(
                "export '{name}' must be a function"
            )));
        };
        if !is_i32_signature(&ty, params, results) {
            return Err(VmError::ValidationError(format!(
                "export '{name}' has wrong signature: expected {params} i32 params and {results} i32 results"
            )));
        }
    }
    Ok(())
}

fn validate_entry_points(module: &Module) -> Result<(), VmError> {
    for ep in EntryPoint::ALL {
        let Some(export) = module.get_export(ep.name()) else {
            continue;
        };
        let ok = matches!(&export, ExternType::Func(ty) if is_i32_signature(ty, ep.arity(), 1));
        if !ok {
            return Err(VmError::ValidationError(format!(
                "entry point '{}' must be a function taking {} i32 and returning one i32",
                ep.name(),
                ep.arity()
            )));
        }
    }
    Ok(())
}

fn validate_imports(module: &Module, available: &BTreeSet<String>) -> Result<(), VmError> {
    for import in module.imports() {
        let module_name = import.module();
        let name = import.name();

        if module_name != IMPORT_MODULE {
            return Err(VmError::ValidationError(format!(
                "import from unknown module '{module_name}' (only '{IMPORT_MODULE}' allowed): {name}"
            )));
        }

        let ExternType::Func(ty) = import.ty() else {
            return Err(VmError::ValidationError(format!(
                "non-function import not allowed: {module_name}::{name}"
            )));
        };

        let Some(&(_, params, results, capability)) =
            HOST_FUNCTIONS.iter().find(|(n, ..)| *n == name)
        else {
            return Err(VmError::ValidationError(format!(
                "unknown host function import: {module_name}::{name}"
            )));
        };

        if !is_i32_signature(&ty, params, results) {
            return Err(VmError::ValidationError(format!(
                "import '{name}' has wrong signature: expected {params} i32 params and {results} i32 results"
            )));
        }

        if let Some(cap) = capability {
            if !available.contains(cap) {
                return Err(VmError::ValidationError(format!(
                    "import '{name}' requires capability '{cap}' which is not available"
                )));
            }
        }
    }
    Ok(())
}

fn validate_capabilities(module: &Module, available: &BTreeSet<String>) -> Result<(), VmError> {
    let missing: Vec<String> = required_capabilities(module)
        .difference(available)
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(VmError::ValidationError(format!(
            "wasm contract requires unavailable capabilities: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}
