//! # corevm Runtime
//!
//! Execute corevm bytecode: a register machine over a flat, growable,
//! byte-addressed memory, with an operand stack, a file table, host
//! enumeration services, and whole-machine snapshot persistence.

pub mod error;
mod exec;
pub mod files;
pub mod host;
pub mod io;
pub mod loader;
pub mod machine;
pub mod memory;
pub mod snapshot;

pub use error::RuntimeError;
pub use io::Console;
pub use machine::{Vm, SNAPSHOT_FILE};
pub use memory::Memory;

/// Load and run a program image; returns the machine for inspection.
pub fn run(program: &corevm_spec::Program) -> error::Result<Vm> {
    let mut vm = Vm::new()?;
    vm.load(program)?;
    vm.run();
    Ok(vm)
}
