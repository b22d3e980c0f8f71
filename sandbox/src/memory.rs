//! Bounds-checked access to the core's linear memory.
//!
//! Every helper validates the range against the memory slice it is given,
//! which is the memory's size at the time of the call. Callers fetch the
//! slice again after anything that may have grown memory.

use std::ops::Range;

use crate::error::SandboxError;

/// Validate `[ptr, ptr+len)` against a memory of `mem_len` bytes.
pub fn checked_range(mem_len: usize, ptr: u32, len: u32) -> Result<Range<usize>, SandboxError> {
    let start = ptr as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or(SandboxError::OutOfBounds { ptr, len })?;
    if end > mem_len {
        return Err(SandboxError::OutOfBounds { ptr, len });
    }
    Ok(start..end)
}

/// Read `len` bytes at `ptr`.
pub fn read_bytes(mem: &[u8], ptr: u32, len: u32) -> Result<Vec<u8>, SandboxError> {
    let range = checked_range(mem.len(), ptr, len)?;
    Ok(mem[range].to_vec())
}

/// Write `data` at `ptr`.
pub fn write_bytes(mem: &mut [u8], ptr: u32, data: &[u8]) -> Result<(), SandboxError> {
    let len = u32::try_from(data.len()).map_err(|_| SandboxError::OutOfBounds {
        ptr,
        len: u32::MAX,
    })?;
    let range = checked_range(mem.len(), ptr, len)?;
    mem[range].copy_from_slice(data);
    Ok(())
}

/// Read a little-endian u32 at `ptr`.
pub fn read_u32(mem: &[u8], ptr: u32) -> Result<u32, SandboxError> {
    let range = checked_range(mem.len(), ptr, 4)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&mem[range]);
    Ok(u32::from_le_bytes(buf))
}

/// Write a little-endian u32 at `ptr`.
pub fn write_u32(mem: &mut [u8], ptr: u32, value: u32) -> Result<(), SandboxError> {
    write_bytes(mem, ptr, &value.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bytes_basic() {
        let mem = vec![10, 20, 30, 40, 50];
        assert_eq!(read_bytes(&mem, 1, 3).unwrap(), vec![20, 30, 40]);
        assert_eq!(read_bytes(&mem, 5, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_read_bytes_out_of_bounds() {
        let mem = vec![10, 20, 30];
        assert_eq!(
            read_bytes(&mem, 1, 3).unwrap_err(),
            SandboxError::OutOfBounds { ptr: 1, len: 3 }
        );
        assert!(read_bytes(&mem, u32::MAX, 2).is_err());
        assert!(read_bytes(&mem, 4, 0).is_err());
    }

    #[test]
    fn test_write_bytes() {
        let mut mem = vec![0; 8];
        write_bytes(&mut mem, 2, &[0xAA, 0xBB]).unwrap();
        assert_eq!(&mem[2..4], &[0xAA, 0xBB]);
        assert!(write_bytes(&mut mem, 7, &[1, 2]).is_err());
        assert_eq!(mem[7], 0);
    }

    #[test]
    fn test_read_write_u32() {
        let mut mem = vec![0; 16];
        write_u32(&mut mem, 4, 0x1234_5678).unwrap();
        assert_eq!(&mem[4..8], &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(read_u32(&mem, 4).unwrap(), 0x1234_5678);
        assert!(read_u32(&mem, 13).is_err());
    }

    #[test]
    fn test_checked_range_after_growth() {
        assert!(checked_range(65536, 65530, 8).is_err());
        assert_eq!(checked_range(2 * 65536, 65530, 8).unwrap(), 65530..65538);
    }
}
