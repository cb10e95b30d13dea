//! Call context handed to every entry point.

use serde::{Deserialize, Serialize};

use crate::types::{Addr, Coin, Timestamp};

/// Block, transaction, and contract the call executes in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    pub block: BlockInfo,
    /// `None` when the call does not originate from a transaction
    /// (e.g. queries, begin/end block hooks).
    pub transaction: Option<TransactionInfo>,
    pub contract: ContractInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub time: Timestamp,
    pub chain_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    /// Position of the transaction in the block.
    pub index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub address: Addr,
}

/// Sender and attached funds. Passed only to `instantiate` and `execute`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub sender: Addr,
    pub funds: Vec<Coin>,
}

impl Env {
    pub fn new(height: u64, time: Timestamp, chain_id: impl Into<String>, contract: Addr) -> Self {
        Self {
            block: BlockInfo {
                height,
                time,
                chain_id: chain_id.into(),
            },
            transaction: None,
            contract: ContractInfo { address: contract },
        }
    }

    pub fn with_transaction(mut self, index: u32) -> Self {
        self.transaction = Some(TransactionInfo { index });
        self
    }
}
