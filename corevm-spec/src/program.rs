//! Program container and the on-disk binary format.
//!
//! A program file is `[u32 LE code_size][code_size bytes of bytecode]`.
//! The format carries no magic and no version; the size header is the
//! entire framing.

use crate::error::{Result, SpecError};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// A compiled program: the raw bytecode stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub code: Vec<u8>,
}

impl Program {
    pub fn new(code: Vec<u8>) -> Self {
        Program { code }
    }

    /// Code size in bytes.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Serialize to the `[u32 LE size][code]` wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.code.len());
        out.extend_from_slice(&(self.code.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.code);
        out
    }

    /// Parse from the wire form. Fails on a missing header or short code.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(SpecError::MissingHeader);
        }
        let size = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let code = &bytes[4..];
        if (code.len() as u32) < size {
            return Err(SpecError::TruncatedProgram {
                expected: size,
                actual: code.len(),
            });
        }
        Ok(Program::new(code[..size as usize].to_vec()))
    }

    /// Write the wire form to a stream.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&(self.code.len() as u32).to_le_bytes())?;
        w.write_all(&self.code)?;
        Ok(())
    }

    /// Read the wire form from a stream.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut header = [0u8; 4];
        r.read_exact(&mut header).map_err(|_| SpecError::MissingHeader)?;
        let size = u32::from_le_bytes(header);
        let mut code = vec![0u8; size as usize];
        let mut filled = 0;
        while filled < code.len() {
            let n = r.read(&mut code[filled..])?;
            if n == 0 {
                return Err(SpecError::TruncatedProgram {
                    expected: size,
                    actual: filled,
                });
            }
            filled += n;
        }
        Ok(Program::new(code))
    }

    /// Compute the SHA-256 hash of the wire form.
    pub fn hash(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update((self.code.len() as u32).to_le_bytes());
        hasher.update(&self.code);
        hasher.finalize().into()
    }
}
