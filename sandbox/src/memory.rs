//! Contract linear memory access through `Region` descriptors.
//!
//! A `Region` is a 12 byte struct in contract memory:
//! `{ offset: u32 LE, capacity: u32 LE, length: u32 LE }`. Every pointer
//! exchanged with the contract (arguments, results, host call inputs and
//! outputs) is the address of a `Region`. All functions validate the struct
//! and the described range against the current memory size; a contract
//! handing out a bad region gets a runtime error.

use contractvm_hostapi::HostError;

/// Byte size of a serialized `Region`.
pub const REGION_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub offset: u32,
    pub capacity: u32,
    pub length: u32,
}

impl Region {
    fn from_le_bytes(bytes: &[u8; REGION_SIZE]) -> Self {
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self {
            offset: word(0),
            capacity: word(4),
            length: word(8),
        }
    }

    fn validate(&self) -> Result<(), HostError> {
        if self.offset == 0 {
            return Err(HostError::runtime("region has a null offset"));
        }
        if self.length > self.capacity {
            return Err(HostError::runtime(format!(
                "region length {} exceeds capacity {}",
                self.length, self.capacity
            )));
        }
        if self.offset.checked_add(self.capacity).is_none() {
            return Err(HostError::runtime("region end exceeds the 32 bit address space"));
        }
        Ok(())
    }
}

/// Read `len` bytes from contract memory at `ptr`.
pub fn read_bytes(mem: &[u8], ptr: u32, len: usize) -> Result<Vec<u8>, HostError> {
    let start = ptr as usize;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= mem.len())
        .ok_or_else(|| HostError::runtime(format!("out of bounds read at {ptr} (len {len})")))?;
    Ok(mem[start..end].to_vec())
}

/// Write `data` to contract memory at `ptr`.
pub fn write_bytes(mem: &mut [u8], ptr: u32, data: &[u8]) -> Result<(), HostError> {
    let start = ptr as usize;
    let end = start
        .checked_add(data.len())
        .filter(|end| *end <= mem.len())
        .ok_or_else(|| {
            HostError::runtime(format!("out of bounds write at {ptr} (len {})", data.len()))
        })?;
    mem[start..end].copy_from_slice(data);
    Ok(())
}

/// Load and validate the `Region` struct at `ptr`.
pub fn get_region(mem: &[u8], ptr: u32) -> Result<Region, HostError> {
    if ptr == 0 {
        return Err(HostError::runtime("null region pointer"));
    }
    let bytes = read_bytes(mem, ptr, REGION_SIZE)?;
    let mut raw = [0u8; REGION_SIZE];
    raw.copy_from_slice(&bytes);
    let region = Region::from_le_bytes(&raw);
    region.validate()?;
    Ok(region)
}

/// Read the contents of the region at `ptr`. Regions longer than `max_len`
/// are rejected before any data is copied.
pub fn read_region(mem: &[u8], ptr: u32, max_len: usize) -> Result<Vec<u8>, HostError> {
    let region = get_region(mem, ptr)?;
    if region.length as usize > max_len {
        return Err(HostError::runtime(format!(
            "region length {} exceeds limit {max_len}",
            region.length
        )));
    }
    read_bytes(mem, region.offset, region.length as usize)
}

/// Copy `data` into the region at `ptr` and set its length. The region's
/// capacity must be large enough.
pub fn write_region(mem: &mut [u8], ptr: u32, data: &[u8]) -> Result<(), HostError> {
    let region = get_region(mem, ptr)?;
    let len = u32::try_from(data.len())
        .map_err(|_| HostError::runtime("data does not fit in a region"))?;
    if len > region.capacity {
        return Err(HostError::runtime(format!(
            "region capacity {} too small for {len} bytes",
            region.capacity
        )));
    }
    write_bytes(mem, region.offset, data)?;
    write_bytes(mem, ptr + 8, &len.to_le_bytes())
}
