//! # corevm Embedded Dialect
//!
//! The on-device counterpart of the host machine: a line assembler that
//! emits a dense byte stream, and a fixed-size interpreter with 4 KiB of
//! RAM, eight registers, and a descending stack.
//!
//! The embedded dialect is deliberately not bytecode-compatible with the
//! host dialect: address words are big-endian and the opcode set is its own.

pub mod assembler;
pub mod error;
pub mod opcode;
pub mod storage;
pub mod vm;

pub use assembler::{assemble_source, compile_command, resolve_path, Assembly};
pub use error::EmbeddedError;
pub use opcode::EmbeddedOpcode;
pub use vm::EmbeddedVm;

/// RAM size in bytes.
pub const MEM_SIZE: usize = 4096;

/// Number of registers.
pub const NUM_REGS: usize = 8;

/// Stack depth in words; the stack grows downward from this index.
pub const STACK_SIZE: usize = 256;

/// Default RAM persistence file.
pub const SYSTEM_DATA_PATH: &str = "/system/systemdata.dat";
