//! Runtime fault types.
//!
//! Every variant's display string is the message reported on stderr as
//! `Error at IP <ip>: <message>` when the machine faults.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    // ========== Decode faults ==========
    #[error("Read byte out of program bounds")]
    FetchByte,

    #[error("Cannot read uint32 (out of program bounds)")]
    FetchWord,

    #[error("Address operand read out of program bounds")]
    FetchAddrOperand,

    #[error("Unknown opcode: 0x{opcode:02x}")]
    UnknownOpcode { opcode: u8 },

    // ========== Register faults ==========
    #[error("Invalid register R{index} in {context}")]
    InvalidRegister { index: u8, context: &'static str },

    // ========== Memory faults ==========
    #[error("Cannot read byte at {addr} (out of memory bounds)")]
    ReadByteOutOfBounds { addr: u32 },

    #[error("Cannot read uint32 at {addr} (out of memory bounds)")]
    ReadOutOfBounds { addr: u32 },

    #[error("Cannot write uint32 at {addr} (out of memory bounds)")]
    WriteOutOfBounds { addr: u32 },

    #[error("Invalid address {addr} for {context}")]
    InvalidAddress { addr: u32, context: &'static str },

    #[error("Invalid memory address in {context}")]
    InvalidAddressIn { context: &'static str },

    #[error("Invalid memory range in {context}")]
    InvalidRange { context: &'static str },

    #[error("Not enough memory for {context}")]
    NotEnoughMemory { context: &'static str },

    #[error("Unterminated string in FILE_OPEN")]
    UnterminatedString,

    #[error("Failed to allocate additional memory")]
    AllocationFailed,

    // ========== Control-flow faults ==========
    #[error("{kind} address {addr} out of bounds")]
    BranchOutOfBounds { kind: &'static str, addr: u32 },

    #[error("Stack overflow in {context}")]
    StackOverflow { context: &'static str },

    #[error("Stack underflow in {context}")]
    StackUnderflow { context: &'static str },

    // ========== Arithmetic faults ==========
    #[error("Division by zero")]
    DivisionByZero,

    // ========== I/O faults ==========
    #[error("Invalid file handle in {context}")]
    InvalidHandle { context: &'static str },

    #[error("File table full")]
    FileTableFull,

    #[error("Invalid whence in FILE_SEEK")]
    InvalidWhence,

    #[error("Error reading input")]
    InputFailed,

    // ========== Snapshot faults ==========
    #[error("Failed to create snapshot file")]
    SnapshotCreate,

    #[error("Failed to write snapshot")]
    SnapshotWrite,

    #[error("Failed to open snapshot file")]
    SnapshotOpen,

    #[error("Failed to read data from snapshot")]
    SnapshotRead,

    #[error("Snapshot magic mismatch (not a snapshot file)")]
    SnapshotBadMagic,

    #[error("Unsupported snapshot version {0}")]
    SnapshotBadVersion(u32),

    #[error("Snapshot stack pointer {0} out of range")]
    SnapshotBadStackPointer(u32),

    // ========== Loader errors ==========
    #[error("Error opening program file: {0}")]
    ProgramOpen(std::io::Error),

    #[error("Error reading program: {0}")]
    ProgramRead(#[from] corevm_spec::SpecError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
