//! Opcode handlers.
//!
//! Each handler consumes its own operands (advancing the instruction
//! pointer), mutates machine state, and reports faults through `Result`.
//! Handlers never continue past a failed operand fetch.

use crate::error::{Result, RuntimeError};
use crate::files::{open_options, Handle};
use crate::host;
use crate::machine::Vm;
use crate::snapshot;
use corevm_spec::{Flags, OPEN_FAILED};
use std::io::{Read, Seek, SeekFrom, Write};

pub(crate) fn op_nop(_vm: &mut Vm) -> Result<()> {
    Ok(())
}

pub(crate) fn op_halt(vm: &mut Vm) -> Result<()> {
    vm.running = false;
    Ok(())
}

fn branch_target(vm: &mut Vm, kind: &'static str) -> Result<u32> {
    let addr = vm.read_u32()?;
    if addr >= vm.program_size {
        return Err(RuntimeError::BranchOutOfBounds { kind, addr });
    }
    Ok(addr)
}

pub(crate) fn op_jump(vm: &mut Vm) -> Result<()> {
    vm.ip = branch_target(vm, "Jump")?;
    Ok(())
}

pub(crate) fn op_call(vm: &mut Vm) -> Result<()> {
    let addr = branch_target(vm, "Call")?;
    vm.push(vm.ip, "CALL")?;
    vm.ip = addr;
    Ok(())
}

pub(crate) fn op_ret(vm: &mut Vm) -> Result<()> {
    // The popped target is not validated; a target past the program simply
    // ends the run at the top of the loop.
    vm.ip = vm.pop("RET")?;
    Ok(())
}

pub(crate) fn op_if(vm: &mut Vm) -> Result<()> {
    let mask = vm.read_byte()?;
    let addr = branch_target(vm, "Conditional jump")?;
    if vm.flags.matches(mask) {
        vm.ip = addr;
    }
    Ok(())
}

pub(crate) fn op_load(vm: &mut Vm) -> Result<()> {
    let reg = vm.read_reg("LOAD")?;
    let addr = vm.read_addr_operand()?;
    vm.registers[reg.index()] = vm.memory.read_u32_le(addr)?;
    Ok(())
}

pub(crate) fn op_store(vm: &mut Vm) -> Result<()> {
    let reg = vm.read_reg("STORE")?;
    let addr = vm.read_addr_operand()?;
    vm.memory.write_u32_le(addr, vm.registers[reg.index()])
}

pub(crate) fn op_move(vm: &mut Vm) -> Result<()> {
    let dest = vm.read_reg("MOVE")?;
    let src = vm.read_reg("MOVE")?;
    vm.registers[dest.index()] = vm.registers[src.index()];
    Ok(())
}

pub(crate) fn op_push(vm: &mut Vm) -> Result<()> {
    let reg = vm.read_reg("PUSH")?;
    vm.push(vm.registers[reg.index()], "PUSH")
}

pub(crate) fn op_pop(vm: &mut Vm) -> Result<()> {
    let reg = vm.read_reg("POP")?;
    vm.registers[reg.index()] = vm.pop("POP")?;
    Ok(())
}

pub(crate) fn op_loadi(vm: &mut Vm) -> Result<()> {
    let reg = vm.read_reg("LOADI")?;
    let imm = vm.read_u32()?;
    vm.registers[reg.index()] = imm;
    Ok(())
}

// ========== ALU ==========

fn binary_op(vm: &mut Vm, context: &'static str, f: fn(u32, u32) -> u32) -> Result<()> {
    let dest = vm.read_reg(context)?;
    let a = vm.read_reg(context)?;
    let b = vm.read_reg(context)?;
    vm.registers[dest.index()] = f(vm.registers[a.index()], vm.registers[b.index()]);
    Ok(())
}

pub(crate) fn op_add(vm: &mut Vm) -> Result<()> {
    binary_op(vm, "ADD", u32::wrapping_add)
}

pub(crate) fn op_sub(vm: &mut Vm) -> Result<()> {
    binary_op(vm, "SUB", u32::wrapping_sub)
}

pub(crate) fn op_mul(vm: &mut Vm) -> Result<()> {
    binary_op(vm, "MUL", u32::wrapping_mul)
}

pub(crate) fn op_div(vm: &mut Vm) -> Result<()> {
    let dest = vm.read_reg("DIV")?;
    let a = vm.read_reg("DIV")?;
    let b = vm.read_reg("DIV")?;
    let divisor = vm.registers[b.index()];
    if divisor == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    vm.registers[dest.index()] = vm.registers[a.index()] / divisor;
    Ok(())
}

pub(crate) fn op_and(vm: &mut Vm) -> Result<()> {
    binary_op(vm, "AND", |a, b| a & b)
}

pub(crate) fn op_or(vm: &mut Vm) -> Result<()> {
    binary_op(vm, "OR", |a, b| a | b)
}

pub(crate) fn op_xor(vm: &mut Vm) -> Result<()> {
    binary_op(vm, "XOR", |a, b| a ^ b)
}

pub(crate) fn op_not(vm: &mut Vm) -> Result<()> {
    let dest = vm.read_reg("NOT")?;
    let src = vm.read_reg("NOT")?;
    vm.registers[dest.index()] = !vm.registers[src.index()];
    Ok(())
}

pub(crate) fn op_cmp(vm: &mut Vm) -> Result<()> {
    let reg = vm.read_reg("CMP")?;
    let imm = vm.read_u32()?;
    vm.flags = Flags::compare(vm.registers[reg.index()], imm);
    Ok(())
}

fn shift_op(vm: &mut Vm, context: &'static str, f: fn(u32, u32) -> u32) -> Result<()> {
    let dest = vm.read_reg(context)?;
    let src = vm.read_reg(context)?;
    let amount = vm.read_u32()?;
    vm.registers[dest.index()] = if amount >= 32 {
        0
    } else {
        f(vm.registers[src.index()], amount)
    };
    Ok(())
}

pub(crate) fn op_shl(vm: &mut Vm) -> Result<()> {
    shift_op(vm, "SHL", |v, n| v << n)
}

pub(crate) fn op_shr(vm: &mut Vm) -> Result<()> {
    shift_op(vm, "SHR", |v, n| v >> n)
}

pub(crate) fn op_break(vm: &mut Vm) -> Result<()> {
    let _ = writeln!(
        vm.console.output,
        "Breakpoint at IP: {}. Press Enter to continue...",
        vm.ip
    );
    let _ = vm.console.output.flush();
    vm.console.wait_for_line();
    Ok(())
}

// ========== Host lists ==========

fn store_listing(vm: &mut Vm, addr: u32, listing: &str, context: &'static str) -> Result<()> {
    let len = listing.len() as u32;
    let end = addr
        .checked_add(len)
        .and_then(|e| e.checked_add(1))
        .ok_or(RuntimeError::NotEnoughMemory { context })?;
    vm.memory.ensure(end)?;
    let dest = vm.memory.slice_mut(addr, len + 1)?;
    dest[..len as usize].copy_from_slice(listing.as_bytes());
    dest[len as usize] = 0;
    Ok(())
}

pub(crate) fn op_fs_list(vm: &mut Vm) -> Result<()> {
    let addr = vm.read_u32()?;
    if addr >= vm.memory.size() {
        return Err(RuntimeError::InvalidAddress { addr, context: "FS_LIST" });
    }
    let listing = host::list_cwd();
    store_listing(vm, addr, &listing, "FS_LIST")
}

pub(crate) fn op_env_list(vm: &mut Vm) -> Result<()> {
    let addr = vm.read_u32()?;
    if addr >= vm.memory.size() {
        return Err(RuntimeError::InvalidAddress { addr, context: "ENV_LIST" });
    }
    let listing = host::list_env();
    store_listing(vm, addr, &listing, "ENV_LIST")
}

// ========== Console ==========

pub(crate) fn op_print(vm: &mut Vm) -> Result<()> {
    let reg = vm.read_reg("PRINT")?;
    let _ = write!(vm.console.output, "{}", vm.registers[reg.index()]);
    let _ = vm.console.output.flush();
    Ok(())
}

pub(crate) fn op_input(vm: &mut Vm) -> Result<()> {
    let reg = vm.read_reg("INPUT")?;
    match vm.console.read_int() {
        Some(value) => {
            vm.registers[reg.index()] = value as u32;
            Ok(())
        }
        None => Err(RuntimeError::InputFailed),
    }
}

pub(crate) fn op_prints(vm: &mut Vm) -> Result<()> {
    let addr = vm.read_u32()?;
    if addr >= vm.memory.size() {
        return Err(RuntimeError::InvalidAddressIn { context: "PRINTS" });
    }
    // Print up to the NUL, or to the end of memory when unterminated.
    let tail = vm.memory.tail(addr);
    let len = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    if len > 0 {
        let bytes = tail[..len].to_vec();
        let _ = vm.console.output.write_all(&bytes);
        let _ = vm.console.output.flush();
    }
    Ok(())
}

// ========== Snapshot ==========

pub(crate) fn op_snapshot(vm: &mut Vm) -> Result<()> {
    snapshot::save(vm)?;
    let _ = writeln!(
        vm.console.output,
        "Snapshot saved to {}",
        vm.snapshot_path.display()
    );
    let _ = vm.console.output.flush();
    Ok(())
}

pub(crate) fn op_restore(vm: &mut Vm) -> Result<()> {
    snapshot::restore(vm)?;
    let _ = writeln!(
        vm.console.output,
        "Snapshot restored from {} (IP NOT restored)",
        vm.snapshot_path.display()
    );
    let _ = vm.console.output.flush();
    Ok(())
}

// ========== File table ==========

pub(crate) fn op_file_open(vm: &mut Vm) -> Result<()> {
    let r_name = vm.read_reg("FILE_OPEN")?;
    let r_mode = vm.read_reg("FILE_OPEN")?;
    let r_dest = vm.read_reg("FILE_OPEN")?;

    let name_addr = vm.registers[r_name.index()];
    let mode_addr = vm.registers[r_mode.index()];
    if name_addr >= vm.memory.size() || mode_addr >= vm.memory.size() {
        return Err(RuntimeError::InvalidAddressIn { context: "FILE_OPEN" });
    }

    let name = vm.memory.c_string_at(name_addr)?;
    let mode = vm.memory.c_string_at(mode_addr)?;

    // The standard streams open by name to their reserved slots.
    match name.as_str() {
        "stdin" => {
            vm.registers[r_dest.index()] = 0;
            return Ok(());
        }
        "stdout" => {
            vm.registers[r_dest.index()] = 1;
            return Ok(());
        }
        "stderr" => {
            vm.registers[r_dest.index()] = 2;
            return Ok(());
        }
        _ => {}
    }

    let opened = open_options(&mode).and_then(|opts| opts.open(&name).ok());
    match opened {
        None => {
            vm.registers[r_dest.index()] = OPEN_FAILED;
            Ok(())
        }
        Some(file) => match vm.files.allocate(file) {
            Some(slot) => {
                vm.registers[r_dest.index()] = slot;
                Ok(())
            }
            None => Err(RuntimeError::FileTableFull),
        },
    }
}

pub(crate) fn op_file_read(vm: &mut Vm) -> Result<()> {
    let r_fd = vm.read_reg("FILE_READ")?;
    let r_buf = vm.read_reg("FILE_READ")?;
    let r_cnt = vm.read_reg("FILE_READ")?;
    let r_ret = vm.read_reg("FILE_READ")?;

    let fd = vm.registers[r_fd.index()];
    let dest = vm.registers[r_buf.index()];
    let count = vm.registers[r_cnt.index()];
    if !vm.files.is_open(fd) {
        return Err(RuntimeError::InvalidHandle { context: "FILE_READ" });
    }

    let end = dest
        .checked_add(count)
        .ok_or(RuntimeError::NotEnoughMemory { context: "FILE_READ" })?;
    vm.memory.ensure(end)?;

    let handle = vm.files.get_mut(fd).expect("validated handle");
    let buffer = vm.memory.slice_mut(dest, count)?;
    let read = match handle {
        Handle::File(file) => file.read(buffer).unwrap_or(0),
        Handle::Stdin => vm.console.input.read(buffer).unwrap_or(0),
        Handle::Stdout | Handle::Stderr => 0,
    };
    vm.registers[r_ret.index()] = read as u32;
    Ok(())
}

pub(crate) fn op_file_write(vm: &mut Vm) -> Result<()> {
    let r_fd = vm.read_reg("FILE_WRITE")?;
    let r_buf = vm.read_reg("FILE_WRITE")?;
    let r_cnt = vm.read_reg("FILE_WRITE")?;
    let r_ret = vm.read_reg("FILE_WRITE")?;

    let fd = vm.registers[r_fd.index()];
    let src = vm.registers[r_buf.index()];
    let count = vm.registers[r_cnt.index()];
    if !vm.files.is_open(fd) {
        return Err(RuntimeError::InvalidHandle { context: "FILE_WRITE" });
    }

    let end = src
        .checked_add(count)
        .ok_or(RuntimeError::InvalidRange { context: "FILE_WRITE" })?;
    if end > vm.memory.size() {
        return Err(RuntimeError::InvalidRange { context: "FILE_WRITE" });
    }

    let handle = vm.files.get_mut(fd).expect("validated handle");
    let buffer = vm.memory.slice(src, count)?;
    let written = match handle {
        Handle::File(file) => file.write(buffer).unwrap_or(0),
        Handle::Stdout => {
            let n = vm.console.output.write(buffer).unwrap_or(0);
            let _ = vm.console.output.flush();
            n
        }
        Handle::Stderr => std::io::stderr().write(buffer).unwrap_or(0),
        Handle::Stdin => 0,
    };
    vm.registers[r_ret.index()] = written as u32;
    Ok(())
}

pub(crate) fn op_file_close(vm: &mut Vm) -> Result<()> {
    let reg = vm.read_reg("FILE_CLOSE")?;
    let fd = vm.registers[reg.index()];
    if vm.files.close(fd) {
        Ok(())
    } else {
        Err(RuntimeError::InvalidHandle { context: "FILE_CLOSE" })
    }
}

pub(crate) fn op_file_seek(vm: &mut Vm) -> Result<()> {
    let r_fd = vm.read_reg("FILE_SEEK")?;
    let offset = vm.read_u32()?;
    let whence = vm.read_u32()?;
    let r_ret = vm.read_reg("FILE_SEEK")?;

    let fd = vm.registers[r_fd.index()];
    if !vm.files.is_open(fd) {
        return Err(RuntimeError::InvalidHandle { context: "FILE_SEEK" });
    }
    let position = match whence {
        0 => SeekFrom::Start(offset as u64),
        1 => SeekFrom::Current(offset as i64),
        2 => SeekFrom::End(offset as i64),
        _ => return Err(RuntimeError::InvalidWhence),
    };
    let result = match vm.files.get_mut(fd).expect("validated handle") {
        Handle::File(file) => {
            if file.seek(position).is_ok() {
                0
            } else {
                u32::MAX
            }
        }
        // The reserved stream slots are not seekable.
        _ => u32::MAX,
    };
    vm.registers[r_ret.index()] = result;
    Ok(())
}
