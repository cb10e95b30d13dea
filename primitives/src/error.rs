//! Error types shared across the VM.

use core::fmt;

/// Result codes returned to contracts by the crypto host functions.
///
/// The repr values are part of the contract ABI and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    VerificationFailed = 1,
    InvalidHashFormat = 3,
    InvalidSignatureFormat = 4,
    InvalidPubkeyFormat = 5,
    GenericErr = 10,
}

impl ErrorCode {
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::VerificationFailed),
            3 => Some(Self::InvalidHashFormat),
            4 => Some(Self::InvalidSignatureFormat),
            5 => Some(Self::InvalidPubkeyFormat),
            10 => Some(Self::GenericErr),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::VerificationFailed => write!(f, "ERR_VERIFICATION_FAILED"),
            Self::InvalidHashFormat => write!(f, "ERR_INVALID_HASH_FORMAT"),
            Self::InvalidSignatureFormat => write!(f, "ERR_INVALID_SIGNATURE_FORMAT"),
            Self::InvalidPubkeyFormat => write!(f, "ERR_INVALID_PUBKEY_FORMAT"),
            Self::GenericErr => write!(f, "ERR_GENERIC"),
        }
    }
}

/// Errors raised by the primitive layer: gas accounting and the wire codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("out of gas: limit={limit}")]
    OutOfGas { limit: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

pub type ExecResult<T> = Result<T, ExecError>;
