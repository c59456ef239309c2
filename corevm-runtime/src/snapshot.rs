//! Whole-machine snapshot persistence.
//!
//! Layout, all little-endian: `magic:u32 "CVMS"`, `version:u32`, then
//! `memory_size:u32, sp:u32, ip:u32, flags:u8, running:i32,
//! program_size:u32, debug:i32, registers[32]:u32, stack[1024]:u32,
//! memory[memory_size]:u8`.
//!
//! RESTORE rebuilds everything except the instruction pointer: restoring the
//! saved `ip` would re-enter the RESTORE instruction forever, so execution
//! continues at the instruction after it. Open file slots (3-15) are dropped
//! and the reserved stream slots reinstalled.

use crate::error::{Result, RuntimeError};
use crate::machine::Vm;
use crate::memory::Memory;
use corevm_spec::{Flags, NUM_REGISTERS, SNAPSHOT_MAGIC, SNAPSHOT_VERSION, STACK_SIZE};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

fn write_u32(w: &mut impl Write, value: u32) -> Result<()> {
    w.write_all(&value.to_le_bytes())
        .map_err(|_| RuntimeError::SnapshotWrite)
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)
        .map_err(|_| RuntimeError::SnapshotRead)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u8(r: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)
        .map_err(|_| RuntimeError::SnapshotRead)?;
    Ok(buf[0])
}

/// Serialize the full machine state to the snapshot file.
pub fn save(vm: &Vm) -> Result<()> {
    let file = File::create(&vm.snapshot_path).map_err(|_| RuntimeError::SnapshotCreate)?;
    let mut w = BufWriter::new(file);

    write_u32(&mut w, SNAPSHOT_MAGIC)?;
    write_u32(&mut w, SNAPSHOT_VERSION)?;
    write_u32(&mut w, vm.memory.size())?;
    write_u32(&mut w, vm.sp)?;
    write_u32(&mut w, vm.ip)?;
    w.write_all(&[vm.flags.bits()])
        .map_err(|_| RuntimeError::SnapshotWrite)?;
    write_u32(&mut w, vm.running as u32)?;
    write_u32(&mut w, vm.program_size)?;
    write_u32(&mut w, vm.debug as u32)?;
    for value in &vm.registers {
        write_u32(&mut w, *value)?;
    }
    for value in &vm.stack {
        write_u32(&mut w, *value)?;
    }
    w.write_all(vm.memory.as_bytes())
        .map_err(|_| RuntimeError::SnapshotWrite)?;
    w.flush().map_err(|_| RuntimeError::SnapshotWrite)?;
    Ok(())
}

/// Rebuild machine state from the snapshot file. `ip` is left untouched.
pub fn restore(vm: &mut Vm) -> Result<()> {
    let file = File::open(&vm.snapshot_path).map_err(|_| RuntimeError::SnapshotOpen)?;
    let mut r = BufReader::new(file);

    if read_u32(&mut r)? != SNAPSHOT_MAGIC {
        return Err(RuntimeError::SnapshotBadMagic);
    }
    let version = read_u32(&mut r)?;
    if version != SNAPSHOT_VERSION {
        return Err(RuntimeError::SnapshotBadVersion(version));
    }

    let memory_size = read_u32(&mut r)?;
    let sp = read_u32(&mut r)?;
    let _saved_ip = read_u32(&mut r)?;
    let flags = read_u8(&mut r)?;
    let _running = read_u32(&mut r)?;
    let program_size = read_u32(&mut r)?;
    let debug = read_u32(&mut r)?;

    if sp as usize > STACK_SIZE {
        return Err(RuntimeError::SnapshotBadStackPointer(sp));
    }

    let mut registers = [0u32; NUM_REGISTERS];
    for value in registers.iter_mut() {
        *value = read_u32(&mut r)?;
    }
    let mut stack = [0u32; STACK_SIZE];
    for value in stack.iter_mut() {
        *value = read_u32(&mut r)?;
    }

    let mut memory = Memory::with_size(memory_size)?;
    r.read_exact(memory.slice_mut(0, memory_size)?)
        .map_err(|_| RuntimeError::SnapshotRead)?;

    vm.memory = memory;
    vm.registers = registers;
    vm.stack = stack;
    vm.sp = sp;
    vm.flags = Flags::new(flags);
    vm.program_size = program_size;
    vm.debug = debug != 0;
    vm.running = true;
    vm.files.reset();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Console;
    use corevm_spec::Program;
    use std::io::Cursor;

    fn quiet_vm() -> Vm {
        let console = Console::from_streams(
            Box::new(Cursor::new(Vec::new())),
            Box::new(Vec::new()),
        );
        Vm::with_console(console).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_everything_but_ip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.bin");

        let mut vm = quiet_vm();
        vm.load(&Program::new(vec![0x01, 0x00, 0x00])).unwrap();
        vm.set_snapshot_path(&path);
        vm.registers[0] = 99;
        vm.registers[31] = 7;
        vm.stack[0] = 0xAAAA;
        vm.sp = 1;
        vm.ip = 2;
        vm.flags = Flags::new(Flags::EQ);
        vm.memory.write_u32_le(0x400, 0xDEAD_BEEF).unwrap();
        save(&vm).unwrap();

        // Scramble, then restore.
        vm.registers = [0; NUM_REGISTERS];
        vm.stack[0] = 0;
        vm.sp = 0;
        vm.flags = Flags::default();
        vm.ip = 777;
        vm.memory.write_u32_le(0x400, 0).unwrap();
        restore(&mut vm).unwrap();

        assert_eq!(vm.registers[0], 99);
        assert_eq!(vm.registers[31], 7);
        assert_eq!(vm.stack[0], 0xAAAA);
        assert_eq!(vm.sp, 1);
        assert_eq!(vm.flags.bits(), Flags::EQ);
        assert_eq!(vm.memory.read_u32_le(0x400).unwrap(), 0xDEAD_BEEF);
        assert_eq!(vm.program_size, 3);
        assert!(vm.running);
        assert_eq!(vm.ip, 777, "ip must not be restored");
    }

    #[test]
    fn test_restore_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut vm = quiet_vm();
        vm.set_snapshot_path(dir.path().join("absent.bin"));
        assert!(matches!(restore(&mut vm), Err(RuntimeError::SnapshotOpen)));
    }

    #[test]
    fn test_restore_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.bin");
        std::fs::write(&path, b"not a snapshot at all").unwrap();
        let mut vm = quiet_vm();
        vm.set_snapshot_path(&path);
        assert!(matches!(
            restore(&mut vm),
            Err(RuntimeError::SnapshotBadMagic)
        ));
    }

    #[test]
    fn test_restore_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.bin");
        let mut bytes = SNAPSHOT_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&999u32.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();
        let mut vm = quiet_vm();
        vm.set_snapshot_path(&path);
        assert!(matches!(
            restore(&mut vm),
            Err(RuntimeError::SnapshotBadVersion(999))
        ));
    }

    #[test]
    fn test_restore_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");

        let mut vm = quiet_vm();
        vm.set_snapshot_path(&path);
        save(&vm).unwrap();
        let full = std::fs::read(&path).unwrap();
        std::fs::write(&path, &full[..full.len() / 2]).unwrap();
        assert!(matches!(restore(&mut vm), Err(RuntimeError::SnapshotRead)));
    }

    #[test]
    fn test_restore_rejects_wild_sp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sp.bin");

        let mut vm = quiet_vm();
        vm.set_snapshot_path(&path);
        save(&vm).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        // sp lives right after magic, version, and memory_size.
        bytes[12..16].copy_from_slice(&5000u32.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            restore(&mut vm),
            Err(RuntimeError::SnapshotBadStackPointer(5000))
        ));
    }
}
