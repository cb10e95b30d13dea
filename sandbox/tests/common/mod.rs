//! Shared test helpers for integration tests.
//!
//! Test contracts are written in WAT and assembled here. Every contract gets
//! the same prelude: an exported memory, a bump `allocate`, a no-op
//! `deallocate`, and `interface_version_1`. Static byte strings are laid out
//! in a data segment and referenced from the body as `{{name}}`, which
//! expands to a call creating a region over them.

#![allow(dead_code)]

use std::path::Path;

use contractvm_hostapi::{mock_backend, Backend, MemStore, MockQuerier};
use contractvm_primitives::{coins, Addr, Env, GasMeter, MessageInfo, Timestamp, UFraction};
use contractvm_sandbox::{CallError, VmConfig, VmError};

pub use std::sync::Arc;

/// Generous limit used where gas is not the subject of the test.
pub const HIGH_GAS_LIMIT: u64 = 500_000_000_000;

/// First byte of static data in a test contract.
const STATICS_BASE: usize = 1024;

// ── Contract assembly ──

fn escape(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\{b:02x}")).collect()
}

/// Assemble a test contract into wasm bytes.
///
/// `imports` holds `(import ...)` forms, `statics` the named byte strings,
/// `body` the exported entry points.
pub fn build_contract(imports: &str, statics: &[(&str, &[u8])], body: &str) -> Vec<u8> {
    let mut data = String::new();
    let mut body = body.to_string();
    let mut offset = STATICS_BASE;
    for (name, bytes) in statics {
        data.push_str(&format!("(data (i32.const {offset}) \"{}\")\n", escape(bytes)));
        body = body.replace(
            &format!("{{{{{name}}}}}"),
            &format!("(call $region (i32.const {offset}) (i32.const {}))", bytes.len()),
        );
        offset += bytes.len();
    }
    let heap_start = (offset + 7) & !7;

    let wat = format!(
        r#"(module
  {imports}
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const {heap_start}))
  {data}
  (func $allocate (export "allocate") (param $size i32) (result i32)
    (local $region i32)
    (local $end i32)
    (local.set $region (global.get $heap))
    (local.set $end (i32.add (i32.add (local.get $region) (i32.const 12)) (local.get $size)))
    (if (i32.gt_u (local.get $end) (i32.mul (memory.size) (i32.const 65536)))
      (then
        (drop (memory.grow
          (i32.add
            (i32.shr_u
              (i32.sub (local.get $end) (i32.mul (memory.size) (i32.const 65536)))
              (i32.const 16))
            (i32.const 1))))))
    (i32.store (local.get $region) (i32.add (local.get $region) (i32.const 12)))
    (i32.store offset=4 (local.get $region) (local.get $size))
    (i32.store offset=8 (local.get $region) (i32.const 0))
    (global.set $heap (i32.and (i32.add (local.get $end) (i32.const 7)) (i32.const -8)))
    (local.get $region))
  (func (export "deallocate") (param i32))
  (func (export "interface_version_1"))
  (func $region (param $ptr i32) (param $len i32) (result i32)
    (local $r i32)
    (local.set $r (call $allocate (i32.const 0)))
    (i32.store (local.get $r) (local.get $ptr))
    (i32.store offset=4 (local.get $r) (local.get $len))
    (i32.store offset=8 (local.get $r) (local.get $len))
    (local.get $r))
  (func $byte (param $region i32) (param $idx i32) (result i32)
    (i32.load8_u (i32.add (i32.load (local.get $region)) (local.get $idx))))
  {body}
)"#
    );
    wat::parse_str(&wat).unwrap()
}

// ── Contracts ──

pub const INIT_RESPONSE: &str =
    r#"{"ok":{"messages":[],"attributes":[{"key":"Let the","value":"hacking begin"}],"events":[],"data":null}}"#;

pub const RELEASE_RESPONSE: &str = r#"{"ok":{"messages":[{"id":0,"msg":{"bank":{"send":{"to_address":"fred","amount":[{"denom":"earth","amount":"1000"}]}}},"gas_limit":null,"reply_on":"never"}],"attributes":[{"key":"action","value":"release"}],"events":[],"data":null}}"#;

/// base64 of `{"verifier":"fred"}`
pub const VERIFIER_B64: &str = "eyJ2ZXJpZmllciI6ImZyZWQifQ==";

/// Escrow style contract.
///
/// - `instantiate` stores the message under `config` and logs through `debug`
/// - `execute` dispatches on the first key letter of the message:
///   `release` (one bank message), `panic` (unreachable), `loop` (never
///   terminates), `abort`, `memory` (grows past any sane limit), `garbage`
///   (non-JSON result); anything else is a contract error
/// - `query` answers `{"verifier":"fred"}`
/// - `migrate` and `reply` succeed; `sudo` is not exported
pub fn hackatom() -> Vec<u8> {
    let query_response = format!(r#"{{"ok":"{VERIFIER_B64}"}}"#);
    build_contract(
        r#"(import "env" "db_read" (func $db_read (param i32) (result i32)))
  (import "env" "db_write" (func $db_write (param i32 i32)))
  (import "env" "abort" (func $abort (param i32)))
  (import "env" "debug" (func $debug (param i32)))"#,
        &[
            ("config_key", b"config"),
            ("debug_msg", b"instantiating"),
            ("init_ok", INIT_RESPONSE.as_bytes()),
            ("release_ok", RELEASE_RESPONSE.as_bytes()),
            ("no_config", br#"{"error":"config not found"}"#),
            ("custom_err", br#"{"error":"custom failure"}"#),
            ("garbage", b"this is not json"),
            ("abort_msg", b"panicked at 'boom'"),
            ("query_ok", query_response.as_bytes()),
            (
                "migrate_ok",
                br#"{"ok":{"messages":[],"attributes":[{"key":"action","value":"migrate"}],"events":[],"data":null}}"#,
            ),
            ("reply_ok", br#"{"ok":{"data":"cmVwbGllZA=="}}"#),
        ],
        r#"
  (func (export "instantiate") (param $env i32) (param $info i32) (param $msg i32) (result i32)
    (call $debug {{debug_msg}})
    (call $db_write {{config_key}} (local.get $msg))
    {{init_ok}})
  (func (export "execute") (param $env i32) (param $info i32) (param $msg i32) (result i32)
    (local $op i32)
    (local.set $op (call $byte (local.get $msg) (i32.const 2)))
    ;; release
    (if (i32.eq (local.get $op) (i32.const 114))
      (then
        (if (i32.eqz (call $db_read {{config_key}}))
          (then (return {{no_config}})))
        (return {{release_ok}})))
    ;; panic
    (if (i32.eq (local.get $op) (i32.const 112))
      (then unreachable))
    ;; loop
    (if (i32.eq (local.get $op) (i32.const 108))
      (then (loop $forever (br $forever))))
    ;; abort
    (if (i32.eq (local.get $op) (i32.const 97))
      (then (call $abort {{abort_msg}})))
    ;; memory
    (if (i32.eq (local.get $op) (i32.const 109))
      (then (drop (memory.grow (i32.const 1000)))))
    ;; garbage
    (if (i32.eq (local.get $op) (i32.const 103))
      (then (return {{garbage}})))
    {{custom_err}})
  (func (export "query") (param $env i32) (param $msg i32) (result i32)
    {{query_ok}})
  (func (export "migrate") (param $env i32) (param $msg i32) (result i32)
    {{migrate_ok}})
  (func (export "reply") (param $env i32) (param $reply i32) (result i32)
    {{reply_ok}})
"#,
    )
}

/// Contract using the `iterator` capability.
///
/// `instantiate` writes keys `a`, `b`, `c`. `execute` with `{"count":{}}`
/// scans everything and fails unless the scan got iterator id 1 and saw
/// three records; `{"open":{}}` opens iterators until the host refuses;
/// `{"range":{}}` scans `[a, c)` descending and stores the first two
/// records under `r1` and `r2`, failing if a third one comes back.
pub fn iterator_contract() -> Vec<u8> {
    build_contract(
        r#"(import "env" "db_write" (func $db_write (param i32 i32)))
  (import "env" "db_scan" (func $db_scan (param i32 i32 i32) (result i32)))
  (import "env" "db_next" (func $db_next (param i32) (result i32)))"#,
        &[
            ("a", b"a"),
            ("b", b"b"),
            ("c", b"c"),
            ("value", b"v"),
            ("r1", b"r1"),
            ("r2", b"r2"),
            ("ok", br#"{"ok":{}}"#),
            ("count_ok", br#"{"ok":{"attributes":[{"key":"count","value":"3"}]}}"#),
            ("err_first", br#"{"error":"first iterator id was not 1"}"#),
            ("err_count", br#"{"error":"unexpected record count"}"#),
        ],
        r#"
  (func (export "requires_iterator"))
  (func (export "instantiate") (param i32 i32 i32) (result i32)
    (call $db_write {{a}} {{value}})
    (call $db_write {{b}} {{value}})
    (call $db_write {{c}} {{value}})
    {{ok}})
  (func (export "execute") (param $env i32) (param $info i32) (param $msg i32) (result i32)
    (local $id i32)
    (local $count i32)
    ;; open
    (if (i32.eq (call $byte (local.get $msg) (i32.const 2)) (i32.const 111))
      (then
        (loop $open
          (drop (call $db_scan (i32.const 0) (i32.const 0) (i32.const 1)))
          (br $open))))
    ;; range
    (if (i32.eq (call $byte (local.get $msg) (i32.const 2)) (i32.const 114))
      (then
        (local.set $id (call $db_scan {{a}} {{c}} (i32.const 2)))
        (call $db_write {{r1}} (call $db_next (local.get $id)))
        (call $db_write {{r2}} (call $db_next (local.get $id)))
        (if (call $db_next (local.get $id))
          (then (return {{err_count}})))
        (return {{ok}})))
    (local.set $id (call $db_scan (i32.const 0) (i32.const 0) (i32.const 1)))
    (if (i32.ne (local.get $id) (i32.const 1))
      (then (return {{err_first}})))
    (block $done
      (loop $next
        (br_if $done (i32.eqz (call $db_next (local.get $id))))
        (local.set $count (i32.add (local.get $count) (i32.const 1)))
        (br $next)))
    (if (i32.ne (local.get $count) (i32.const 3))
      (then (return {{err_count}})))
    {{count_ok}})
"#,
    )
}

/// Fixed ed25519 key, message, and signature.
pub fn ed25519_fixture() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    use ed25519_dalek::{Signer, SigningKey};
    let key = SigningKey::from_bytes(&[7u8; 32]);
    let message = b"hello".to_vec();
    let signature = key.sign(&message).to_bytes().to_vec();
    (message, signature, key.verifying_key().to_bytes().to_vec())
}

/// Fixed secp256k1 hash, signature, and compressed public key.
pub fn secp256k1_fixture() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::{Signature, SigningKey};
    let hash = contractvm_primitives::crypto::sha256(b"transfer 100 earth").to_vec();
    let key = SigningKey::from_slice(&[1u8; 32]).unwrap();
    let signature: Signature = key.sign_prehash(&hash).unwrap();
    let pubkey = key.verifying_key().to_encoded_point(true).as_bytes().to_vec();
    (hash, signature.to_bytes().to_vec(), pubkey)
}

/// Contract exercising the crypto and address imports.
///
/// `execute` dispatches on the first key letter: `valid`, `tampered`,
/// `key` (31 byte pubkey), `secp` run a verification and report the outcome
/// as the `result` attribute; `human` validates `Fred` and stores the error
/// message under `addr_error`; `canonical` canonicalizes `Fred` and stores
/// the result under `canonical`.
pub fn crypto_contract() -> Vec<u8> {
    let (message, signature, pubkey) = ed25519_fixture();
    let (hash, secp_sig, secp_pubkey) = secp256k1_fixture();
    build_contract(
        r#"(import "env" "db_write" (func $db_write (param i32 i32)))
  (import "env" "ed25519_verify" (func $ed25519_verify (param i32 i32 i32) (result i32)))
  (import "env" "secp256k1_verify" (func $secp256k1_verify (param i32 i32 i32) (result i32)))
  (import "env" "addr_validate" (func $addr_validate (param i32) (result i32)))
  (import "env" "addr_canonicalize" (func $addr_canonicalize (param i32 i32) (result i32)))"#,
        &[
            ("message", &message),
            ("tampered", b"hellO"),
            ("signature", &signature),
            ("pubkey", &pubkey),
            ("short_pubkey", &pubkey[..31]),
            ("hash", &hash),
            ("secp_sig", &secp_sig),
            ("secp_pubkey", &secp_pubkey),
            ("fred_upper", b"Fred"),
            ("addr_error_key", b"addr_error"),
            ("canonical_key", b"canonical"),
            ("ok", br#"{"ok":{}}"#),
            ("valid", br#"{"ok":{"attributes":[{"key":"result","value":"valid"}]}}"#),
            ("invalid", br#"{"ok":{"attributes":[{"key":"result","value":"invalid"}]}}"#),
            ("bad_pubkey", br#"{"ok":{"attributes":[{"key":"result","value":"bad_pubkey"}]}}"#),
            ("other", br#"{"ok":{"attributes":[{"key":"result","value":"other"}]}}"#),
            ("unexpected", br#"{"error":"unexpected host result"}"#),
        ],
        r#"
  (func $verdict (param $code i32) (result i32)
    (if (i32.eqz (local.get $code)) (then (return {{valid}})))
    (if (i32.eq (local.get $code) (i32.const 1)) (then (return {{invalid}})))
    (if (i32.eq (local.get $code) (i32.const 5)) (then (return {{bad_pubkey}})))
    {{other}})
  (func (export "instantiate") (param i32 i32 i32) (result i32)
    {{ok}})
  (func (export "execute") (param $env i32) (param $info i32) (param $msg i32) (result i32)
    (local $op i32)
    (local $result i32)
    (local.set $op (call $byte (local.get $msg) (i32.const 2)))
    ;; valid
    (if (i32.eq (local.get $op) (i32.const 118))
      (then (return (call $verdict (call $ed25519_verify {{message}} {{signature}} {{pubkey}})))))
    ;; tampered
    (if (i32.eq (local.get $op) (i32.const 116))
      (then (return (call $verdict (call $ed25519_verify {{tampered}} {{signature}} {{pubkey}})))))
    ;; key
    (if (i32.eq (local.get $op) (i32.const 107))
      (then (return (call $verdict (call $ed25519_verify {{message}} {{signature}} {{short_pubkey}})))))
    ;; secp
    (if (i32.eq (local.get $op) (i32.const 115))
      (then (return (call $verdict (call $secp256k1_verify {{hash}} {{secp_sig}} {{secp_pubkey}})))))
    ;; human
    (if (i32.eq (local.get $op) (i32.const 104))
      (then
        (local.set $result (call $addr_validate {{fred_upper}}))
        (if (i32.eqz (local.get $result)) (then (return {{unexpected}})))
        (call $db_write {{addr_error_key}} (local.get $result))
        (return {{ok}})))
    ;; canonical
    (if (i32.eq (local.get $op) (i32.const 99))
      (then
        (local.set $result (call $allocate (i32.const 64)))
        (if (i32.ne (call $addr_canonicalize {{fred_upper}} (local.get $result)) (i32.const 0))
          (then (return {{unexpected}})))
        (call $db_write {{canonical_key}} (local.get $result))
        (return {{ok}})))
    {{unexpected}})
"#,
    )
}

/// Contract whose `execute` sends `request` through `query_chain` and stores
/// the raw answer under the key `result`.
pub fn querier_contract(request: &str) -> Vec<u8> {
    build_contract(
        r#"(import "env" "db_write" (func $db_write (param i32 i32)))
  (import "env" "query_chain" (func $query_chain (param i32) (result i32)))"#,
        &[
            ("request", request.as_bytes()),
            ("result_key", b"result"),
            ("ok", br#"{"ok":{}}"#),
        ],
        r#"
  (func (export "instantiate") (param i32 i32 i32) (result i32)
    {{ok}})
  (func (export "execute") (param $env i32) (param $info i32) (param $msg i32) (result i32)
    (call $db_write {{result_key}} (call $query_chain {{request}}))
    {{ok}})
"#,
    )
}

// ── Call fixtures ──

pub fn mock_env() -> Env {
    Env::new(
        12_345,
        Timestamp::from_nanos(1_571_797_419_879_305_533),
        "cosmos-testnet-14002",
        Addr::unchecked("contract"),
    )
}

pub fn mock_info(sender: &str) -> MessageInfo {
    MessageInfo {
        sender: Addr::unchecked(sender),
        funds: coins(1000, "earth"),
    }
}

pub const INIT_MSG: &[u8] = br#"{"verifier":"fred","beneficiary":"bob"}"#;

/// Fresh backend with an empty store and a querier that knows no contracts.
pub fn backend() -> (Backend, Arc<MemStore>) {
    mock_backend(MockQuerier::new())
}

pub fn test_config(dir: &Path) -> VmConfig {
    VmConfig::new(dir).with_capabilities("iterator,staking")
}

/// Call with a fresh meter sized to `gas_limit` and full-price result
/// decoding.
pub fn meter(gas_limit: u64) -> GasMeter {
    GasMeter::new(gas_limit)
}

pub const DESER: UFraction = UFraction::ONE;

pub fn expect_error(result: Result<impl std::fmt::Debug, CallError>) -> (VmError, u64) {
    match result {
        Ok(value) => panic!("expected an error, got {value:?}"),
        Err(CallError { error, gas_used }) => (error, gas_used),
    }
}
