//! Host-side limits for a single contract call.

use contractvm_primitives::types::{
    MAX_DEBUG_LEN, MAX_HUMAN_ADDRESS_LEN, MAX_KEY_LEN, MAX_QUERY_REQUEST_LEN, MAX_RESULT_LEN,
    MAX_VALUE_LEN,
};

/// Limits enforced by the host functions. Violations abort the call with a
/// runtime error; the contract cannot exceed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Maximum length of a storage key in bytes.
    pub max_key_len: usize,
    /// Maximum length of a storage value in bytes.
    pub max_value_len: usize,
    /// Maximum number of iterators a single call may open.
    pub max_iterators: usize,
    /// Maximum length of the region an entry point returns.
    pub max_result_len: usize,
    /// Maximum length of a `query_chain` request.
    pub max_query_request_len: usize,
    /// Maximum length of an address passed to the address functions.
    pub max_address_len: usize,
    /// Maximum length of a `debug` or `abort` message.
    pub max_debug_len: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_key_len: MAX_KEY_LEN,
            max_value_len: MAX_VALUE_LEN,
            max_iterators: 32,
            max_result_len: MAX_RESULT_LEN,
            max_query_request_len: MAX_QUERY_REQUEST_LEN,
            max_address_len: MAX_HUMAN_ADDRESS_LEN,
            max_debug_len: MAX_DEBUG_LEN,
        }
    }
}

impl ExecutionConfig {
    pub fn with_max_iterators(mut self, max_iterators: usize) -> Self {
        self.max_iterators = max_iterators;
        self
    }

    pub fn with_max_result_len(mut self, max_result_len: usize) -> Self {
        self.max_result_len = max_result_len;
        self
    }
}
