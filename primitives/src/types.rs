//! Core value types and limits shared by the VM, host interfaces, and tests.
//!
//! Numeric wrappers serialize as decimal strings and `Binary` as base64 so
//! that the JSON seen by contracts never loses precision.

use core::fmt;
use core::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Maximum storage key length accepted by `db_read`/`db_write`/`db_remove`.
pub const MAX_KEY_LEN: usize = 64 * 1024;

/// Maximum storage value length accepted by `db_write`.
pub const MAX_VALUE_LEN: usize = 128 * 1024;

/// Maximum length of a human readable address passed to the address API.
pub const MAX_HUMAN_ADDRESS_LEN: usize = 256;

/// Maximum length of a canonical address passed to `addr_humanize`.
pub const MAX_CANONICAL_ADDRESS_LEN: usize = 64;

/// Maximum length of a serialized `query_chain` request.
pub const MAX_QUERY_REQUEST_LEN: usize = 64 * 1024;

/// Maximum length of a message passed to `ed25519_verify`.
pub const MAX_ED25519_MESSAGE_LEN: usize = 128 * 1024;

/// Maximum length of a `debug` or `abort` message.
pub const MAX_DEBUG_LEN: usize = 2 * 1024;

/// Maximum length of the region returned by an entry point.
pub const MAX_RESULT_LEN: usize = 64 * 1024 * 1024;

/// Byte length of a [`Checksum`].
pub const CHECKSUM_LEN: usize = 32;

// ── Checksum ──

/// SHA-256 digest of raw contract bytecode. The only identity of stored code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum([u8; CHECKSUM_LEN]);

impl Checksum {
    /// Compute the checksum of `wasm`.
    pub fn generate(wasm: &[u8]) -> Self {
        let digest = Sha256::digest(wasm);
        let mut out = [0u8; CHECKSUM_LEN];
        out.copy_from_slice(&digest);
        Self(out)
    }

    /// Parse a 64 character hex string.
    pub fn from_hex(input: &str) -> Result<Self, ChecksumError> {
        let bytes = hex::decode(input).map_err(|_| ChecksumError::InvalidHex)?;
        Self::try_from(bytes.as_slice())
    }

    /// Lowercase hex encoding, used for display and file names.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; CHECKSUM_LEN] {
        &self.0
    }
}

impl From<[u8; CHECKSUM_LEN]> for Checksum {
    fn from(bytes: [u8; CHECKSUM_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Checksum {
    type Error = ChecksumError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; CHECKSUM_LEN] = bytes
            .try_into()
            .map_err(|_| ChecksumError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChecksumError {
    #[error("checksum is not valid hex")]
    InvalidHex,
    #[error("checksum must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

// ── Binary ──

/// Opaque bytes, base64 (standard alphabet, padded) in JSON.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Binary(pub Vec<u8>);

impl Binary {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(encoded).map(Self)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Binary {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Binary {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Binary {
    fn from(bytes: &[u8; N]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Debug for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Binary({})", hex::encode(&self.0))
    }
}

impl Serialize for Binary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Binary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(de::Error::custom)
    }
}

// ── Integers as strings ──

macro_rules! string_uint {
    ($name:ident, $inner:ty) => {
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub $inner);

        impl $name {
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            pub const fn u(self) -> $inner {
                self.0
            }

            pub fn checked_add(self, other: Self) -> Option<Self> {
                self.0.checked_add(other.0).map(Self)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl FromStr for $name {
            type Err = core::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<$inner>().map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse::<$name>().map_err(de::Error::custom)
            }
        }
    };
}

string_uint!(Uint64, u64);
string_uint!(Uint128, u128);

/// Point in time as nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(Uint64);

impl Timestamp {
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(Uint64(nanos))
    }

    pub const fn from_seconds(seconds: u64) -> Self {
        Self(Uint64(seconds.saturating_mul(1_000_000_000)))
    }

    pub const fn nanos(&self) -> u64 {
        self.0 .0
    }

    pub const fn seconds(&self) -> u64 {
        self.0 .0 / 1_000_000_000
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.nanos())
    }
}

// ── Addresses and funds ──

/// Human readable address. Construction does not validate; validation is
/// the job of the host `Api`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Addr(String);

impl Addr {
    pub fn unchecked(input: impl Into<String>) -> Self {
        Self(input.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Addr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: Uint128,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: Uint128(amount),
        }
    }
}

/// Shorthand for a single-denomination fund list.
pub fn coins(amount: u128, denom: impl Into<String>) -> Vec<Coin> {
    vec![Coin::new(amount, denom)]
}
