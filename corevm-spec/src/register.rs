//! Register definitions (32 general-purpose unsigned 32-bit registers).
//!
//! There is no ABI: every register is general purpose. The assembler reserves
//! R30/R31 as scratch when expanding pseudo-instructions, but the machine
//! itself treats them like any other register.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of registers.
pub const NUM_REGISTERS: usize = 32;

/// Register index (R0-R31).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Register(u8);

impl Register {
    /// First assembler scratch register used by pseudo-instruction expansion.
    pub const SCRATCH0: Self = Register(30);
    /// Second assembler scratch register.
    pub const SCRATCH1: Self = Register(31);

    /// Validate a raw operand byte.
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        if index < NUM_REGISTERS {
            Some(Register(index as u8))
        } else {
            None
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn to_u8(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_index_valid() {
        for i in 0..NUM_REGISTERS {
            let r = Register::from_index(i).unwrap();
            assert_eq!(r.index(), i);
            assert_eq!(r.to_u8(), i as u8);
        }
    }

    #[test]
    fn test_from_index_invalid() {
        assert!(Register::from_index(32).is_none());
        assert!(Register::from_index(255).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(Register::from_index(0).unwrap().to_string(), "R0");
        assert_eq!(Register::from_index(31).unwrap().to_string(), "R31");
    }
}
