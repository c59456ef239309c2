//! Program loading.
//!
//! Program files carry a `u32` little-endian code size followed by exactly
//! that many bytes of code. The code lands at memory offset 0 and sets the
//! program watermark; a short read is fatal before execution begins.

use crate::error::{Result, RuntimeError};
use crate::machine::Vm;
use corevm_spec::Program;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Load a program file into the machine. Returns the code size.
pub fn load_file(vm: &mut Vm, path: &Path) -> Result<u32> {
    let file = File::open(path).map_err(RuntimeError::ProgramOpen)?;
    let mut reader = BufReader::new(file);
    let program = Program::read_from(&mut reader)?;
    vm.load(&program)?;
    Ok(program.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Console;
    use std::io::Cursor;

    fn quiet_vm() -> Vm {
        let console = Console::from_streams(
            Box::new(Cursor::new(Vec::new())),
            Box::new(Vec::new()),
        );
        Vm::with_console(console).unwrap()
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog.bin");
        let program = Program::new(vec![0x15, 0x00, 0x01, 0, 0, 0, 0x01]);
        std::fs::write(&path, program.to_bytes()).unwrap();

        let mut vm = quiet_vm();
        let size = load_file(&mut vm, &path).unwrap();
        assert_eq!(size, 7);
        assert_eq!(vm.program_size, 7);
        assert_eq!(vm.memory.read_u8(0).unwrap(), 0x15);
        assert_eq!(vm.memory.read_u8(6).unwrap(), 0x01);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut vm = quiet_vm();
        let err = load_file(&mut vm, &dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, RuntimeError::ProgramOpen(_)));
    }

    #[test]
    fn test_load_short_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        // Header claims 100 bytes; only 3 follow.
        let mut bytes = 100u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        std::fs::write(&path, bytes).unwrap();

        let mut vm = quiet_vm();
        let err = load_file(&mut vm, &path).unwrap_err();
        assert!(matches!(err, RuntimeError::ProgramRead(_)));
        assert_eq!(vm.program_size, 0);
    }
}
