//! Machine memory: a flat byte buffer with bounds-checked access and
//! monotonic doubling growth.
//!
//! Words are 32-bit little-endian. Every accessor range-checks and returns a
//! fault instead of wrapping; growth zero-fills the new tail and preserves
//! existing contents. There is no W^X: the code region is writable.

use crate::error::{Result, RuntimeError};
use corevm_spec::INIT_MEM_SIZE;

#[derive(Debug)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Allocate the initial memory, zero-filled.
    pub fn new() -> Result<Self> {
        Self::with_size(INIT_MEM_SIZE)
    }

    /// Allocate memory of an exact size, zero-filled.
    pub fn with_size(size: u32) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size as usize)
            .map_err(|_| RuntimeError::AllocationFailed)?;
        bytes.resize(size as usize, 0);
        Ok(Memory { bytes })
    }

    /// Current size in bytes.
    #[inline]
    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Grow so that `required` bytes are addressable.
    ///
    /// The size doubles until it covers `required`; if doubling overflows,
    /// the size falls back to `required + INIT_MEM_SIZE`. Existing bytes are
    /// preserved and the new tail is zeroed. A refused allocation is a fault.
    pub fn ensure(&mut self, required: u32) -> Result<()> {
        if required <= self.size() {
            return Ok(());
        }
        let mut new_size = self.size();
        while new_size < required {
            match new_size.checked_mul(2) {
                Some(doubled) => new_size = doubled,
                None => {
                    new_size = required.saturating_add(INIT_MEM_SIZE);
                    break;
                }
            }
        }
        let additional = (new_size - self.size()) as usize;
        self.bytes
            .try_reserve_exact(additional)
            .map_err(|_| RuntimeError::AllocationFailed)?;
        self.bytes.resize(new_size as usize, 0);
        Ok(())
    }

    /// Read one byte.
    pub fn read_u8(&self, addr: u32) -> Result<u8> {
        self.bytes
            .get(addr as usize)
            .copied()
            .ok_or(RuntimeError::ReadByteOutOfBounds { addr })
    }

    /// Write one byte, growing memory to cover it.
    pub fn write_u8(&mut self, addr: u32, value: u8) -> Result<()> {
        let end = addr
            .checked_add(1)
            .ok_or(RuntimeError::WriteOutOfBounds { addr })?;
        self.ensure(end)?;
        self.bytes[addr as usize] = value;
        Ok(())
    }

    /// Read a 32-bit little-endian word.
    pub fn read_u32_le(&self, addr: u32) -> Result<u32> {
        let end = addr
            .checked_add(4)
            .ok_or(RuntimeError::ReadOutOfBounds { addr })?;
        if end > self.size() {
            return Err(RuntimeError::ReadOutOfBounds { addr });
        }
        let i = addr as usize;
        Ok(u32::from_le_bytes([
            self.bytes[i],
            self.bytes[i + 1],
            self.bytes[i + 2],
            self.bytes[i + 3],
        ]))
    }

    /// Write a 32-bit little-endian word, growing memory to cover it.
    pub fn write_u32_le(&mut self, addr: u32, value: u32) -> Result<()> {
        let end = addr
            .checked_add(4)
            .ok_or(RuntimeError::WriteOutOfBounds { addr })?;
        self.ensure(end)?;
        self.bytes[addr as usize..end as usize].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Borrow `len` bytes starting at `addr`.
    pub fn slice(&self, addr: u32, len: u32) -> Result<&[u8]> {
        let end = addr
            .checked_add(len)
            .ok_or(RuntimeError::ReadOutOfBounds { addr })?;
        if end > self.size() {
            return Err(RuntimeError::ReadOutOfBounds { addr });
        }
        Ok(&self.bytes[addr as usize..end as usize])
    }

    /// Mutably borrow `len` bytes starting at `addr`. Does not grow.
    pub fn slice_mut(&mut self, addr: u32, len: u32) -> Result<&mut [u8]> {
        let end = addr
            .checked_add(len)
            .ok_or(RuntimeError::WriteOutOfBounds { addr })?;
        if end > self.size() {
            return Err(RuntimeError::WriteOutOfBounds { addr });
        }
        Ok(&mut self.bytes[addr as usize..end as usize])
    }

    /// Bytes from `addr` to the end of memory (empty when out of range).
    pub fn tail(&self, addr: u32) -> &[u8] {
        self.bytes.get(addr as usize..).unwrap_or(&[])
    }

    /// Scan for a NUL-terminated string starting at `addr`.
    pub fn c_string_at(&self, addr: u32) -> Result<String> {
        let tail = self.tail(addr);
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(RuntimeError::UnterminatedString)?;
        Ok(String::from_utf8_lossy(&tail[..len]).into_owned())
    }

    /// Whole memory image, for snapshots.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
