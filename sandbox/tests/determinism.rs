//! Determinism integration tests.
//!
//! Identical inputs must produce identical responses and gas, regardless of
//! cache state, VM instance, or thread.

mod common;

use contractvm_hostapi::Storage;
use contractvm_primitives::Response;
use contractvm_sandbox::{Vm, VmError};

use common::*;

fn run_lifecycle(vm: &Vm) -> (Vec<(Response, u64)>, Arc<contractvm_hostapi::MemStore>) {
    let checksum = vm.store_code(&hackatom()).unwrap();
    let (backend, store) = backend();
    let mut results = Vec::new();

    results.push(
        vm.instantiate(
            &checksum,
            &mock_env(),
            &mock_info("creator"),
            INIT_MSG,
            backend.clone(),
            &mut meter(HIGH_GAS_LIMIT),
            HIGH_GAS_LIMIT,
            DESER,
        )
        .unwrap(),
    );
    results.push(
        vm.execute(
            &checksum,
            &mock_env(),
            &mock_info("verifies"),
            br#"{"release":{}}"#,
            backend,
            &mut meter(HIGH_GAS_LIMIT),
            HIGH_GAS_LIMIT,
            DESER,
        )
        .unwrap(),
    );
    (results, store)
}

// ── Test: same input, same output ──

#[test]
fn test_repeated_calls_identical() {
    let dir = tempfile::tempdir().unwrap();
    let vm = Vm::new(test_config(dir.path())).unwrap();

    let (first, _) = run_lifecycle(&vm);
    let (second, _) = run_lifecycle(&vm);
    assert_eq!(first, second);
}

// ── Test: failures are deterministic too ──

#[test]
fn test_failures_identical() {
    let dir = tempfile::tempdir().unwrap();
    let vm = Vm::new(test_config(dir.path())).unwrap();
    let checksum = vm.store_code(&hackatom()).unwrap();

    let run = || {
        let (backend, _) = backend();
        let (error, gas_used) = expect_error(vm.execute(
            &checksum,
            &mock_env(),
            &mock_info("creator"),
            br#"{"panic":{}}"#,
            backend,
            &mut meter(HIGH_GAS_LIMIT),
            HIGH_GAS_LIMIT,
            DESER,
        ));
        (error.to_string(), gas_used)
    };
    assert_eq!(run(), run());
}

// ── Test: cache hit and miss give the same result ──

#[test]
fn test_cache_hit_and_miss_identical() {
    let dir = tempfile::tempdir().unwrap();
    let vm = Vm::new(test_config(dir.path())).unwrap();
    let (warm, _) = run_lifecycle(&vm);

    let checksum = contractvm_primitives::Checksum::generate(&hackatom());

    // A new VM over the same directory compiles from disk.
    let reopened = Vm::new(test_config(dir.path())).unwrap();
    let (backend, _) = backend();
    let result = reopened.instantiate(
        &checksum,
        &mock_env(),
        &mock_info("creator"),
        INIT_MSG,
        backend,
        &mut meter(HIGH_GAS_LIMIT),
        HIGH_GAS_LIMIT,
        DESER,
    );
    assert_eq!(result.unwrap(), warm[0]);
    assert_eq!(reopened.metrics().unwrap().misses, 1);
}

// ── Test: two VMs on two threads ──

#[test]
fn test_concurrent_vms_isolated() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let vm_a = Vm::new(test_config(dir_a.path())).unwrap();
    let vm_b = Vm::new(test_config(dir_b.path())).unwrap();

    let ((results_a, store_a), (results_b, store_b)) = std::thread::scope(|s| {
        let a = s.spawn(|| run_lifecycle(&vm_a));
        let b = s.spawn(|| run_lifecycle(&vm_b));
        (a.join().unwrap(), b.join().unwrap())
    });

    assert_eq!(results_a, results_b);
    assert!(!Arc::ptr_eq(&store_a, &store_b));
    assert_eq!(store_a.snapshot(), store_b.snapshot());
    assert_eq!(store_a.get(b"config").unwrap(), Some(INIT_MSG.to_vec()));
}

// ── Test: one VM shared by many threads ──

#[test]
fn test_shared_vm_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let vm = Vm::new(test_config(dir.path())).unwrap();
    let checksum = vm.store_code(&hackatom()).unwrap();
    let (vm_ref, checksum_ref) = (&vm, &checksum);

    let outcomes: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(move || {
                    let (backend, _) = backend();
                    vm_ref.query(
                        checksum_ref,
                        &mock_env(),
                        br#"{"verifier":{}}"#,
                        backend,
                        &mut meter(HIGH_GAS_LIMIT),
                        HIGH_GAS_LIMIT,
                        DESER,
                    )
                    .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(outcomes.windows(2).all(|w| w[0] == w[1]));
    assert!(!matches!(vm.get_code(&checksum), Err(VmError::NotFound { .. })));
}
