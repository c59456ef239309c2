//! Embedded opcode set and mnemonic matching.
//!
//! Mnemonic casing is exact and intentionally uneven: `push` is lowercase,
//! everything else uppercase. Sources written for existing devices depend on
//! it, so the mixed casing is preserved as-is.

use serde::{Deserialize, Serialize};

/// Embedded-dialect opcode.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddedOpcode {
    Halt = 0x01,
    Load = 0x10,
    Store = 0x11,
    Add = 0x20,
    Sub = 0x21,
    Mul = 0x22,
    Div = 0x23,
    Push = 0x30,
    Pop = 0x31,
    Syscall = 0xFF,
}

impl EmbeddedOpcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(EmbeddedOpcode::Halt),
            0x10 => Some(EmbeddedOpcode::Load),
            0x11 => Some(EmbeddedOpcode::Store),
            0x20 => Some(EmbeddedOpcode::Add),
            0x21 => Some(EmbeddedOpcode::Sub),
            0x22 => Some(EmbeddedOpcode::Mul),
            0x23 => Some(EmbeddedOpcode::Div),
            0x30 => Some(EmbeddedOpcode::Push),
            0x31 => Some(EmbeddedOpcode::Pop),
            0xFF => Some(EmbeddedOpcode::Syscall),
            _ => None,
        }
    }

    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Match the leading mnemonic of a trimmed source line.
    pub fn from_mnemonic(line: &str) -> Option<Self> {
        if line.starts_with("push") {
            Some(EmbeddedOpcode::Push)
        } else if line.starts_with("POP") {
            Some(EmbeddedOpcode::Pop)
        } else if line.starts_with("ADD") {
            Some(EmbeddedOpcode::Add)
        } else if line.starts_with("SUB") {
            Some(EmbeddedOpcode::Sub)
        } else if line.starts_with("MUL") {
            Some(EmbeddedOpcode::Mul)
        } else if line.starts_with("DIV") {
            Some(EmbeddedOpcode::Div)
        } else if line.starts_with("STORE") {
            Some(EmbeddedOpcode::Store)
        } else if line.starts_with("LOAD") {
            Some(EmbeddedOpcode::Load)
        } else if line.starts_with("HALT") {
            Some(EmbeddedOpcode::Halt)
        } else if line.starts_with("SYSCALL") {
            Some(EmbeddedOpcode::Syscall)
        } else {
            None
        }
    }

    /// Whether the mnemonic carries an operand byte in the emitted stream.
    pub const fn has_operand(self) -> bool {
        matches!(
            self,
            EmbeddedOpcode::Push | EmbeddedOpcode::Load | EmbeddedOpcode::Store
        )
    }
}
