//! Shared helpers for the runtime integration suites.
#![allow(dead_code)]

use corevm_runtime::{Console, Vm};
use corevm_spec::Program;
use std::cell::RefCell;
use std::io::{Cursor, Write};
use std::rc::Rc;

/// An output sink the test can read back after the machine is done.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

/// A machine wired to an in-memory console.
pub fn vm_with_io(stdin: &str) -> (Vm, SharedBuf) {
    let out = SharedBuf::default();
    let console = Console::from_streams(
        Box::new(Cursor::new(stdin.as_bytes().to_vec())),
        Box::new(out.clone()),
    );
    (Vm::with_console(console).unwrap(), out)
}

/// Run raw bytecode; returns the finished machine and its stdout.
pub fn run_program(code: &[u8], stdin: &str) -> (Vm, String) {
    let (mut vm, out) = vm_with_io(stdin);
    vm.load(&Program::new(code.to_vec())).unwrap();
    vm.run();
    let stdout = out.contents();
    (vm, stdout)
}

/// Assemble and run a source text; returns the machine and its stdout.
pub fn run_source(source: &str, stdin: &str) -> (Vm, String) {
    let program = corevm_assembler::assemble(source).expect("assembly failed");
    run_program(&program.code, stdin)
}
