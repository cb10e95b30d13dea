//! In-memory `Api` and `Querier` implementations for tests and local runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use contractvm_primitives::codec::{from_json_slice, to_json_vec};
use contractvm_primitives::types::MAX_CANONICAL_ADDRESS_LEN;
use contractvm_primitives::{
    AllBalanceResponse, BalanceResponse, BankQuery, Binary, Coin, ContractResult, QueryRequest,
    SystemError, SystemResult, WasmQuery,
};

use crate::error::HostError;
use crate::mem_store::MemStore;
use crate::traits::{Api, Backend, Querier, QuerierResult};

const MIN_ADDRESS_LEN: usize = 3;

/// Address scheme: an address is 3..=64 lowercase ASCII alphanumerics and
/// its canonical form is the same bytes. Uppercase input canonicalizes to
/// lowercase, so `addr_validate` rejects it as not normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockApi;

impl MockApi {
    fn check_shape(len: usize) -> Result<(), HostError> {
        if len < MIN_ADDRESS_LEN {
            return Err(HostError::user(format!(
                "Invalid input: address too short (must be >= {MIN_ADDRESS_LEN})"
            )));
        }
        if len > MAX_CANONICAL_ADDRESS_LEN {
            return Err(HostError::user(format!(
                "Invalid input: address too long (must be <= {MAX_CANONICAL_ADDRESS_LEN})"
            )));
        }
        Ok(())
    }
}

impl Api for MockApi {
    fn addr_validate(&self, human: &str) -> Result<(), HostError> {
        let canonical = self.addr_canonicalize(human)?;
        let normalized = self.addr_humanize(&canonical)?;
        if normalized != human {
            return Err(HostError::user("Invalid input: address not normalized"));
        }
        Ok(())
    }

    fn addr_canonicalize(&self, human: &str) -> Result<Vec<u8>, HostError> {
        Self::check_shape(human.len())?;
        if !human.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(HostError::user("Invalid input: address contains invalid characters"));
        }
        Ok(human.to_ascii_lowercase().into_bytes())
    }

    fn addr_humanize(&self, canonical: &[u8]) -> Result<String, HostError> {
        Self::check_shape(canonical.len())?;
        if !canonical
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        {
            return Err(HostError::user("Invalid input: canonical address is malformed"));
        }
        String::from_utf8(canonical.to_vec())
            .map_err(|_| HostError::user("Invalid input: canonical address is malformed"))
    }
}

/// Handler answering `wasm` queries: `(query, gas_limit) -> (result, gas_used)`.
pub type WasmHandler = dyn Fn(&WasmQuery, u64) -> (QuerierResult, u64) + Send + Sync;

/// Answers bank queries from a fixed balance table and forwards wasm
/// queries to an optional handler. Bank queries cost no gas.
#[derive(Default)]
pub struct MockQuerier {
    balances: BTreeMap<String, Vec<Coin>>,
    wasm_handler: Option<Box<WasmHandler>>,
}

impl MockQuerier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, address: impl Into<String>, coins: Vec<Coin>) -> Self {
        self.balances.insert(address.into(), coins);
        self
    }

    pub fn with_wasm_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&WasmQuery, u64) -> (QuerierResult, u64) + Send + Sync + 'static,
    {
        self.wasm_handler = Some(Box::new(handler));
        self
    }

    fn bank_query(&self, query: &BankQuery) -> Result<QuerierResult, HostError> {
        let encoded = match query {
            BankQuery::Balance { address, denom } => {
                let amount = self
                    .balances
                    .get(address)
                    .and_then(|coins| coins.iter().find(|c| &c.denom == denom))
                    .cloned()
                    .unwrap_or_else(|| Coin::new(0, denom.clone()));
                to_json_vec(&BalanceResponse { amount })
            }
            BankQuery::AllBalances { address } => {
                let amount = self.balances.get(address).cloned().unwrap_or_default();
                to_json_vec(&AllBalanceResponse { amount })
            }
        }
        .map_err(|e| HostError::internal(e.to_string()))?;
        Ok(SystemResult::Ok(ContractResult::Ok(Binary(encoded))))
    }
}

impl Querier for MockQuerier {
    fn query_raw(&self, request: &[u8], gas_limit: u64) -> (Result<QuerierResult, HostError>, u64) {
        let parsed: QueryRequest = match from_json_slice(request) {
            Ok(req) => req,
            Err(e) => {
                let err = SystemError::InvalidRequest {
                    error: e.to_string(),
                    request: Binary::from(request),
                };
                return (Ok(SystemResult::Err(err)), 0);
            }
        };
        match &parsed {
            QueryRequest::Bank(bank) => (self.bank_query(bank), 0),
            QueryRequest::Wasm(wasm) => match &self.wasm_handler {
                Some(handler) => {
                    let (result, used) = handler(wasm, gas_limit);
                    (Ok(result), used.min(gas_limit))
                }
                None => {
                    let addr = match wasm {
                        WasmQuery::Smart { contract_addr, .. }
                        | WasmQuery::Raw { contract_addr, .. }
                        | WasmQuery::ContractInfo { contract_addr } => contract_addr.clone(),
                    };
                    (Ok(SystemResult::Err(SystemError::NoSuchContract { addr })), 0)
                }
            },
        }
    }
}

/// Backend over a fresh `MemStore`, `MockApi`, and `MockQuerier`. The
/// store is returned separately so tests can inspect it.
pub fn mock_backend(querier: MockQuerier) -> (Backend, Arc<MemStore>) {
    let store = Arc::new(MemStore::new());
    let backend = Backend::new(store.clone(), Arc::new(MockApi), Arc::new(querier));
    (backend, store)
}
