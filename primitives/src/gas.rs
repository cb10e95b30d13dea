//! Gas accounting for contract calls.
//!
//! Gas is consumed from three sources: guest compute (wasmtime fuel, one
//! unit per operator), host calls (base plus per-byte costs from
//! [`GasCosts`]), and result deserialization ([`UFraction`] of the result
//! length). All of it is settled against the caller's [`GasMeter`].

use serde::{Deserialize, Serialize};

use crate::error::{ExecError, ExecResult};

// ── Default gas cost constants ──

/// Base cost for `db_read`.
pub const G_DB_READ: u64 = 1_000;

/// Base cost for `db_write`.
pub const G_DB_WRITE: u64 = 2_000;

/// Base cost for `db_remove`.
pub const G_DB_REMOVE: u64 = 1_000;

/// Base cost for opening an iterator with `db_scan`.
pub const G_DB_SCAN: u64 = 1_000;

/// Base cost for advancing an iterator with `db_next`.
pub const G_DB_NEXT: u64 = 500;

/// Per-byte cost added to storage operations and payload-sized host calls.
pub const G_PER_BYTE: u64 = 3;

pub const G_ADDR_VALIDATE: u64 = 900;
pub const G_ADDR_CANONICALIZE: u64 = 600;
pub const G_ADDR_HUMANIZE: u64 = 500;

/// Cost of one secp256k1 ECDSA verification.
pub const G_SECP256K1_VERIFY: u64 = 150_000;

/// Cost of one ed25519 verification (excluding the per-byte message cost).
pub const G_ED25519_VERIFY: u64 = 60_000;

/// Base cost for `debug`.
pub const G_DEBUG: u64 = 10;

/// Base cost for `query_chain`, on top of the gas the querier reports.
pub const G_QUERY_CHAIN: u64 = 1_000;

/// Host call cost table. Part of the VM configuration so that a chain can
/// tune prices without a code change; the defaults are the `G_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasCosts {
    pub db_read: u64,
    pub db_write: u64,
    pub db_remove: u64,
    pub db_scan: u64,
    pub db_next: u64,
    pub per_byte: u64,
    pub addr_validate: u64,
    pub addr_canonicalize: u64,
    pub addr_humanize: u64,
    pub secp256k1_verify: u64,
    pub ed25519_verify: u64,
    pub debug: u64,
    pub query_chain: u64,
}

impl Default for GasCosts {
    fn default() -> Self {
        Self {
            db_read: G_DB_READ,
            db_write: G_DB_WRITE,
            db_remove: G_DB_REMOVE,
            db_scan: G_DB_SCAN,
            db_next: G_DB_NEXT,
            per_byte: G_PER_BYTE,
            addr_validate: G_ADDR_VALIDATE,
            addr_canonicalize: G_ADDR_CANONICALIZE,
            addr_humanize: G_ADDR_HUMANIZE,
            secp256k1_verify: G_SECP256K1_VERIFY,
            ed25519_verify: G_ED25519_VERIFY,
            debug: G_DEBUG,
            query_chain: G_QUERY_CHAIN,
        }
    }
}

impl GasCosts {
    /// `base + byte_count * per_byte`, saturating.
    pub fn with_bytes(&self, base: u64, byte_count: usize) -> u64 {
        base.saturating_add((byte_count as u64).saturating_mul(self.per_byte))
    }

    pub fn db_read_cost(&self, key_len: usize) -> u64 {
        self.with_bytes(self.db_read, key_len)
    }

    pub fn db_write_cost(&self, key_len: usize, value_len: usize) -> u64 {
        self.with_bytes(self.db_write, key_len.saturating_add(value_len))
    }

    pub fn db_remove_cost(&self, key_len: usize) -> u64 {
        self.with_bytes(self.db_remove, key_len)
    }

    pub fn db_scan_cost(&self, start_len: usize, end_len: usize) -> u64 {
        self.with_bytes(self.db_scan, start_len.saturating_add(end_len))
    }

    pub fn ed25519_verify_cost(&self, msg_len: usize) -> u64 {
        self.with_bytes(self.ed25519_verify, msg_len)
    }

    pub fn debug_cost(&self, msg_len: usize) -> u64 {
        self.with_bytes(self.debug, msg_len)
    }

    pub fn query_chain_cost(&self, request_len: usize) -> u64 {
        self.with_bytes(self.query_chain, request_len)
    }
}

/// Non-negative rational `numerator / denominator` with a non-zero
/// denominator. Used as the per-byte deserialization price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UFraction {
    numerator: u64,
    denominator: u64,
}

impl UFraction {
    pub const ONE: UFraction = UFraction {
        numerator: 1,
        denominator: 1,
    };

    pub const ZERO: UFraction = UFraction {
        numerator: 0,
        denominator: 1,
    };

    /// Returns `None` for a zero denominator.
    pub const fn new(numerator: u64, denominator: u64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        Some(Self {
            numerator,
            denominator,
        })
    }

    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    /// `floor(len * numerator / denominator)`, saturating at `u64::MAX`.
    pub fn apply(&self, len: usize) -> u64 {
        let product = (len as u128) * (self.numerator as u128) / (self.denominator as u128);
        u64::try_from(product).unwrap_or(u64::MAX)
    }
}

impl Default for UFraction {
    fn default() -> Self {
        Self::ONE
    }
}

/// Caller-owned gas budget that outlives individual contract calls.
///
/// A failed charge pins `used` to `limit`: once a charge has been refused,
/// nothing is left for later calls on the same meter.
#[derive(Debug, Clone)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Meter with no practical limit (for testing only).
    pub fn unlimited() -> Self {
        Self::new(u64::MAX)
    }

    /// Add `amount` to the used gas, or fail with `OutOfGas` if that would
    /// exceed the limit.
    pub fn charge(&mut self, amount: u64) -> ExecResult<()> {
        match self.used.checked_add(amount) {
            Some(v) if v <= self.limit => {
                self.used = v;
                Ok(())
            }
            _ => {
                self.used = self.limit;
                Err(ExecError::OutOfGas { limit: self.limit })
            }
        }
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}
