//! Error types for the ISA definition crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("Unknown opcode: 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("Invalid register index {0}")]
    InvalidRegister(usize),

    #[error("Program file truncated: expected {expected} code bytes, got {actual}")]
    TruncatedProgram { expected: u32, actual: usize },

    #[error("Program file too short for its header")]
    MissingHeader,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SpecError>;
