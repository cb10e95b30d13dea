//! Queries a contract may send to the chain through `query_chain`, and the
//! envelopes the host wraps the answers in.

use serde::{Deserialize, Serialize};

use crate::types::{Binary, Coin};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRequest {
    Bank(BankQuery),
    Wasm(WasmQuery),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankQuery {
    Balance { address: String, denom: String },
    AllBalances { address: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasmQuery {
    /// Run the `query` entry point of another contract with `msg`.
    Smart { contract_addr: String, msg: Binary },
    /// Read one raw storage key of another contract.
    Raw { contract_addr: String, key: Binary },
    ContractInfo { contract_addr: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub amount: Coin,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllBalanceResponse {
    pub amount: Vec<Coin>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfoResponse {
    pub code_id: u64,
    pub creator: String,
    pub admin: Option<String>,
}

/// Host-level outcome of a query. `Err` means the query could not be
/// answered at all; a contract-level failure travels inside `Ok` as
/// `ContractResult::Err`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemResult<S> {
    Ok(S),
    #[serde(rename = "error")]
    Err(SystemError),
}

impl<S> SystemResult<S> {
    pub fn into_result(self) -> Result<S, SystemError> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Err(e) => Err(e),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum SystemError {
    #[error("cannot parse request: {error}")]
    InvalidRequest { error: String, request: Binary },
    #[error("cannot parse response: {error}")]
    InvalidResponse { error: String, response: Binary },
    #[error("no such contract: {addr}")]
    NoSuchContract { addr: String },
    #[error("unsupported query type: {kind}")]
    UnsupportedRequest { kind: String },
    #[error("unknown system error")]
    Unknown {},
}
