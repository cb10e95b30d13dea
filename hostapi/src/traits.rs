//! Host interfaces a running contract can reach, besides storage.
//!
//! The sandbox gives every call a [`Backend`]: explicit capability objects
//! shared by `Arc`, never globals. Each trait method works with Rust slices
//! and types; pointer validation and gas charging happen in the sandbox.

use std::sync::Arc;

use contractvm_primitives::{crypto, Binary, ContractResult, SystemResult};

use crate::error::HostError;
use crate::storage::Storage;

/// Address handling and signature verification.
///
/// Address methods return `HostError::User` for input the contract should
/// be told about; the message is written back to the contract.
pub trait Api: Send + Sync {
    /// Check that `human` is a valid, normalized address.
    fn addr_validate(&self, human: &str) -> Result<(), HostError>;

    /// Convert a human readable address to its canonical bytes.
    fn addr_canonicalize(&self, human: &str) -> Result<Vec<u8>, HostError>;

    /// Convert canonical bytes back to the human readable address.
    fn addr_humanize(&self, canonical: &[u8]) -> Result<String, HostError>;

    /// Returns `Ok(true)` if the signature is valid, `Ok(false)` if not.
    /// Malformed inputs are `Err(HostError::Code(..))`.
    fn secp256k1_verify(
        &self,
        message_hash: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<bool, HostError> {
        Ok(crypto::secp256k1_verify(message_hash, signature, public_key)?)
    }

    fn ed25519_verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<bool, HostError> {
        Ok(crypto::ed25519_verify(message, signature, public_key)?)
    }
}

/// Outcome of a chain query as seen by the contract.
pub type QuerierResult = SystemResult<ContractResult<Binary>>;

/// Read-only access to the rest of the chain.
pub trait Querier: Send + Sync {
    /// Answer a JSON encoded `QueryRequest`.
    ///
    /// `gas_limit` is what the calling contract has left; the querier must
    /// not spend more. The second tuple element is the gas it used, which
    /// is charged to the calling contract whether or not the query
    /// succeeded. Returning `used == gas_limit` exhausts the caller.
    fn query_raw(&self, request: &[u8], gas_limit: u64) -> (Result<QuerierResult, HostError>, u64);
}

/// The host capabilities handed to one contract call.
#[derive(Clone)]
pub struct Backend {
    pub storage: Arc<dyn Storage>,
    pub api: Arc<dyn Api>,
    pub querier: Arc<dyn Querier>,
}

impl Backend {
    pub fn new(storage: Arc<dyn Storage>, api: Arc<dyn Api>, querier: Arc<dyn Querier>) -> Self {
        Self {
            storage,
            api,
            querier,
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}
