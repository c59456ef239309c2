//! # corevm Assembler
//!
//! Compile line-oriented mnemonic assembly into corevm program binaries.
//!
//! ## Example
//!
//! ```rust
//! use corevm_assembler::assemble;
//!
//! let program = assemble("LOADI R0, 42\nPRINT R0\nHALT\n").unwrap();
//! assert_eq!(program.code[0], 0x15);
//! ```

pub mod compiler;
pub mod error;
pub mod expand;
pub mod parser;

pub use compiler::{assemble, AsmCompiler};
pub use error::{AssemblerError, Result};

use corevm_spec::Program;
use std::path::Path;

/// Compile a source file and write the `[u32 LE size][code]` binary.
/// Returns the emitted code size in bytes.
pub fn compile_file(input: &Path, output: &Path) -> Result<u32> {
    let source = std::fs::read_to_string(input)?;
    let program = assemble(&source)?;
    let mut file = std::fs::File::create(output)?;
    program.write_to(&mut file)?;
    Ok(program.len() as u32)
}
