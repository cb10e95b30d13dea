//! Host-side error type shared by the storage, api, and querier backends.
//!
//! How the sandbox surfaces each variant to the contract:
//!
//! | Variant    | Contract sees                         |
//! |------------|---------------------------------------|
//! | `Code`     | the `i32` code as the host call result |
//! | `User`     | an error message region               |
//! | `Runtime`  | nothing; the call aborts              |
//! | `Internal` | nothing; the call aborts              |

use contractvm_primitives::ErrorCode;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// A contract-visible result code (crypto verification).
    Code(ErrorCode),
    /// Invalid contract input that the contract can handle, e.g. a
    /// malformed address. Returned to the contract as a message.
    User(String),
    /// The contract broke a host rule (limits, unknown iterator id).
    /// Aborts the call with a runtime error.
    Runtime(String),
    /// The backend itself failed. Aborts the call with a runtime error.
    Internal(String),
}

impl HostError {
    /// Convert to the `i32` code returned to the contract.
    pub fn to_error_code(&self) -> i32 {
        match self {
            Self::Code(code) => code.as_i32(),
            _ => ErrorCode::GenericErr as i32,
        }
    }

    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for variants that abort the running call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Runtime(_) | Self::Internal(_))
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "host error: {}", code),
            Self::User(msg) => write!(f, "{}", msg),
            Self::Runtime(msg) => write!(f, "host rule violated: {}", msg),
            Self::Internal(msg) => write!(f, "internal host error: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

impl From<ErrorCode> for HostError {
    fn from(code: ErrorCode) -> Self {
        Self::Code(code)
    }
}

impl From<contractvm_primitives::CryptoError> for HostError {
    fn from(err: contractvm_primitives::CryptoError) -> Self {
        Self::Code(err.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractvm_primitives::CryptoError;

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(HostError::Code(ErrorCode::VerificationFailed).to_error_code(), 1);
        assert_eq!(HostError::Code(ErrorCode::InvalidPubkeyFormat).to_error_code(), 5);
        assert_eq!(HostError::Code(ErrorCode::Ok).to_error_code(), 0);
    }

    #[test]
    fn test_non_code_variants_map_to_generic() {
        assert_eq!(HostError::user("bad").to_error_code(), 10);
        assert_eq!(HostError::internal("disk").to_error_code(), 10);
    }

    #[test]
    fn test_fatal_variants() {
        assert!(!HostError::user("x").is_fatal());
        assert!(!HostError::Code(ErrorCode::GenericErr).is_fatal());
        assert!(HostError::runtime("x").is_fatal());
        assert!(HostError::internal("x").is_fatal());
    }

    #[test]
    fn test_display() {
        let s = format!("{}", HostError::Code(ErrorCode::InvalidHashFormat));
        assert!(s.contains("ERR_INVALID_HASH_FORMAT"));
        assert_eq!(format!("{}", HostError::user("Invalid input")), "Invalid input");
        assert!(format!("{}", HostError::internal("disk full")).contains("disk full"));
    }

    #[test]
    fn test_from_crypto_error() {
        let err: HostError = CryptoError::InvalidSignatureFormat.into();
        assert_eq!(err, HostError::Code(ErrorCode::InvalidSignatureFormat));
    }
}
