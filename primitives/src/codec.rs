//! Wire encodings at the contract boundary.
//!
//! - Call arguments and results are JSON (`serde_json`), with the field
//!   shapes defined in [`crate::env`], [`crate::execution`], [`crate::query`].
//! - Iterator records returned by `db_next` use a small binary framing:
//!   `u32 LE key length, key, u32 LE value length, value`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ExecError, ExecResult};

pub fn to_json_vec<T: Serialize + ?Sized>(value: &T) -> ExecResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| ExecError::Serialization(e.to_string()))
}

pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> ExecResult<T> {
    serde_json::from_slice(data).map_err(|e| ExecError::Deserialization(e.to_string()))
}

fn write_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);
}

/// Encode one storage record as handed to the contract by `db_next`.
pub fn encode_record(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + key.len() + value.len());
    write_var_bytes(&mut buf, key);
    write_var_bytes(&mut buf, value);
    buf
}
