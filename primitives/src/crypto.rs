//! Cryptographic operations exposed to contracts.
//!
//! Verification is deterministic and never randomized. Malformed inputs are
//! reported as a [`CryptoError`] whose [`code`](CryptoError::code) is what
//! the contract sees; they never become host failures.

use sha2::{Digest, Sha256};

use crate::error::ErrorCode;

pub const SHA256_HASH_LEN: usize = 32;
pub const ECDSA_SIGNATURE_LEN: usize = 64;
pub const ECDSA_COMPRESSED_PUBKEY_LEN: usize = 33;
pub const ECDSA_UNCOMPRESSED_PUBKEY_LEN: usize = 65;
pub const EDDSA_SIGNATURE_LEN: usize = 64;
pub const EDDSA_PUBKEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid hash format")]
    InvalidHashFormat,
    #[error("invalid signature format")]
    InvalidSignatureFormat,
    #[error("invalid public key format")]
    InvalidPubkeyFormat,
    #[error("crypto error: {0}")]
    GenericErr(String),
}

impl CryptoError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidHashFormat => ErrorCode::InvalidHashFormat,
            Self::InvalidSignatureFormat => ErrorCode::InvalidSignatureFormat,
            Self::InvalidPubkeyFormat => ErrorCode::InvalidPubkeyFormat,
            Self::GenericErr(_) => ErrorCode::GenericErr,
        }
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;

pub fn sha256(data: &[u8]) -> [u8; SHA256_HASH_LEN] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; SHA256_HASH_LEN];
    out.copy_from_slice(&digest);
    out
}

/// Verify an ECDSA secp256k1 signature over a 32-byte message hash.
///
/// `signature` is the 64-byte `r || s` serialization; high-S signatures are
/// normalized before verification. `public_key` is a SEC1 point, compressed
/// (33 bytes) or uncompressed (65 bytes).
pub fn secp256k1_verify(message_hash: &[u8], signature: &[u8], public_key: &[u8]) -> CryptoResult<bool> {
    use k256::ecdsa::signature::hazmat::PrehashVerifier;
    use k256::ecdsa::{Signature, VerifyingKey};

    if message_hash.len() != SHA256_HASH_LEN {
        return Err(CryptoError::InvalidHashFormat);
    }
    if signature.len() != ECDSA_SIGNATURE_LEN {
        return Err(CryptoError::InvalidSignatureFormat);
    }
    if public_key.len() != ECDSA_COMPRESSED_PUBKEY_LEN
        && public_key.len() != ECDSA_UNCOMPRESSED_PUBKEY_LEN
    {
        return Err(CryptoError::InvalidPubkeyFormat);
    }

    let mut sig = Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignatureFormat)?;
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
    }
    let key = VerifyingKey::from_sec1_bytes(public_key).map_err(|_| CryptoError::InvalidPubkeyFormat)?;
    Ok(key.verify_prehash(message_hash, &sig).is_ok())
}

/// Verify an ed25519 signature over an arbitrary message.
pub fn ed25519_verify(message: &[u8], signature: &[u8], public_key: &[u8]) -> CryptoResult<bool> {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    let sig: [u8; EDDSA_SIGNATURE_LEN] = signature
        .try_into()
        .map_err(|_| CryptoError::InvalidSignatureFormat)?;
    let pk: [u8; EDDSA_PUBKEY_LEN] = public_key
        .try_into()
        .map_err(|_| CryptoError::InvalidPubkeyFormat)?;

    let Ok(verifying_key) = VerifyingKey::from_bytes(&pk) else {
        return Err(CryptoError::InvalidPubkeyFormat);
    };
    let sig = Signature::from_bytes(&sig);
    Ok(verifying_key.verify(message, &sig).is_ok())
}
