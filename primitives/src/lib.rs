//! `contractvm-primitives`: foundational types for the contract VM.
//!
//! This crate provides the value types, call context, result envelopes,
//! query types, error codes, gas cost tables, cryptographic verification,
//! and wire codec shared by the host interfaces and the sandbox.

pub mod types;
pub mod env;
pub mod error;
pub mod gas;
pub mod execution;
pub mod query;
pub mod crypto;
pub mod codec;

// Re-export commonly used types at the crate root for convenience.
pub use types::{coins, Addr, Binary, Checksum, ChecksumError, Coin, Timestamp, Uint128, Uint64};
pub use env::{BlockInfo, ContractInfo, Env, MessageInfo, TransactionInfo};
pub use error::{ErrorCode, ExecError, ExecResult};
pub use gas::{GasCosts, GasMeter, UFraction};
pub use execution::{
    Attribute, BankMsg, ContractResult, CosmosMsg, Event, Reply, ReplyOn, Response, SubMsg,
    SubMsgResponse, SubMsgResult, WasmMsg,
};
pub use query::{
    AllBalanceResponse, BalanceResponse, BankQuery, ContractInfoResponse, QueryRequest,
    SystemError, SystemResult, WasmQuery,
};
pub use crypto::CryptoError;
