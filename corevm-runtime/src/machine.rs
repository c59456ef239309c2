//! The virtual machine: state, operand fetch, and the dispatch loop.
//!
//! Instructions are dispatched through a 256-entry table keyed by the opcode
//! byte. Every fetch bounds-checks the instruction pointer against the
//! program watermark; any fault halts the loop before further mutation.

use crate::error::{Result, RuntimeError};
use crate::exec;
use crate::files::FileTable;
use crate::io::Console;
use crate::memory::Memory;
use corevm_spec::{
    AddrOperand, Flags, Program, Register, INDIRECT_PREFIX, NUM_REGISTERS, STACK_SIZE,
};
use std::io::Write;
use std::path::PathBuf;

pub(crate) type Handler = fn(&mut Vm) -> Result<()>;

/// Build the opcode-indexed handler table. Unassigned entries fault as
/// unknown opcodes, except the 0xFF terminator handled by the loop itself.
pub(crate) fn dispatch_table() -> [Option<Handler>; 256] {
    use corevm_spec::Opcode::*;
    let mut table: [Option<Handler>; 256] = [None; 256];
    table[Nop as usize] = Some(exec::op_nop as Handler);
    table[Halt as usize] = Some(exec::op_halt);
    table[Jump as usize] = Some(exec::op_jump);
    table[Call as usize] = Some(exec::op_call);
    table[Ret as usize] = Some(exec::op_ret);
    table[If as usize] = Some(exec::op_if);
    table[Load as usize] = Some(exec::op_load);
    table[Store as usize] = Some(exec::op_store);
    table[Move as usize] = Some(exec::op_move);
    table[Push as usize] = Some(exec::op_push);
    table[Pop as usize] = Some(exec::op_pop);
    table[Loadi as usize] = Some(exec::op_loadi);
    table[Add as usize] = Some(exec::op_add);
    table[Sub as usize] = Some(exec::op_sub);
    table[Mul as usize] = Some(exec::op_mul);
    table[Div as usize] = Some(exec::op_div);
    table[And as usize] = Some(exec::op_and);
    table[Or as usize] = Some(exec::op_or);
    table[Xor as usize] = Some(exec::op_xor);
    table[Not as usize] = Some(exec::op_not);
    table[Cmp as usize] = Some(exec::op_cmp);
    table[Shl as usize] = Some(exec::op_shl);
    table[Shr as usize] = Some(exec::op_shr);
    table[Break as usize] = Some(exec::op_break);
    table[FsList as usize] = Some(exec::op_fs_list);
    table[EnvList as usize] = Some(exec::op_env_list);
    table[Print as usize] = Some(exec::op_print);
    table[Input as usize] = Some(exec::op_input);
    table[Prints as usize] = Some(exec::op_prints);
    table[Snapshot as usize] = Some(exec::op_snapshot);
    table[Restore as usize] = Some(exec::op_restore);
    table[FileOpen as usize] = Some(exec::op_file_open);
    table[FileRead as usize] = Some(exec::op_file_read);
    table[FileWrite as usize] = Some(exec::op_file_write);
    table[FileClose as usize] = Some(exec::op_file_close);
    table[FileSeek as usize] = Some(exec::op_file_seek);
    table
}

/// Default snapshot file, in the working directory.
pub const SNAPSHOT_FILE: &str = "snapshot.bin";

#[derive(Debug)]
pub struct Vm {
    pub memory: Memory,
    pub program_size: u32,
    pub registers: [u32; NUM_REGISTERS],
    pub stack: [u32; STACK_SIZE],
    /// Index of the next free stack slot.
    pub sp: u32,
    pub ip: u32,
    pub flags: Flags,
    pub running: bool,
    pub error_occurred: bool,
    pub debug: bool,
    pub(crate) files: FileTable,
    pub(crate) console: Console,
    pub(crate) snapshot_path: PathBuf,
    last_fault: Option<RuntimeError>,
}

impl Vm {
    /// Machine over the process standard streams.
    pub fn new() -> Result<Self> {
        Self::with_console(Console::stdio())
    }

    /// Machine over injected streams (used by tests and embedders).
    pub fn with_console(console: Console) -> Result<Self> {
        Ok(Vm {
            memory: Memory::new()?,
            program_size: 0,
            registers: [0; NUM_REGISTERS],
            stack: [0; STACK_SIZE],
            sp: 0,
            ip: 0,
            flags: Flags::default(),
            running: true,
            error_occurred: false,
            debug: false,
            files: FileTable::new(),
            console,
            snapshot_path: PathBuf::from(SNAPSHOT_FILE),
            last_fault: None,
        })
    }

    /// Override the snapshot file location.
    pub fn set_snapshot_path(&mut self, path: impl Into<PathBuf>) {
        self.snapshot_path = path.into();
    }

    /// Load a program image at memory offset 0 and arm the machine.
    pub fn load(&mut self, program: &Program) -> Result<()> {
        let size = program.len() as u32;
        self.memory.ensure(size + 4)?;
        self.memory
            .slice_mut(0, size)?
            .copy_from_slice(&program.code);
        self.program_size = size;
        Ok(())
    }

    /// The fault that halted the last run, if any.
    pub fn last_fault(&self) -> Option<&RuntimeError> {
        self.last_fault.as_ref()
    }

    /// Fetch/decode/execute until halt or fault.
    pub fn run(&mut self) {
        let dispatch = dispatch_table();
        while self.running {
            if self.ip >= self.program_size {
                self.running = false;
                break;
            }
            let opcode = match self.read_byte() {
                Ok(b) => b,
                Err(err) => {
                    self.fault(err);
                    break;
                }
            };
            match dispatch[opcode as usize] {
                Some(handler) => {
                    if let Err(err) = handler(self) {
                        self.fault(err);
                    }
                }
                // A bare 0xFF at the top level terminates silently.
                None if opcode == INDIRECT_PREFIX => self.running = false,
                None => self.fault(RuntimeError::UnknownOpcode { opcode }),
            }
            if self.debug && self.running {
                self.trace_state();
            }
        }
    }

    /// Report a fault: stderr line, halt, and remember the cause.
    pub(crate) fn fault(&mut self, err: RuntimeError) {
        eprintln!("Error at IP {}: {}", self.ip, err);
        self.running = false;
        self.error_occurred = true;
        self.last_fault = Some(err);
    }

    // ========================================================================
    // Operand fetch. Every read advances ip and checks the program watermark.
    // ========================================================================

    pub(crate) fn read_byte(&mut self) -> Result<u8> {
        if self.ip >= self.program_size {
            return Err(RuntimeError::FetchByte);
        }
        let byte = self.memory.read_u8(self.ip)?;
        self.ip += 1;
        Ok(byte)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let last = self.ip.checked_add(3).ok_or(RuntimeError::FetchWord)?;
        if last >= self.program_size {
            return Err(RuntimeError::FetchWord);
        }
        let value = self.memory.read_u32_le(self.ip)?;
        self.ip += 4;
        Ok(value)
    }

    /// Read and validate a register operand.
    pub(crate) fn read_reg(&mut self, context: &'static str) -> Result<Register> {
        let index = self.read_byte()?;
        Register::from_index(index as usize)
            .ok_or(RuntimeError::InvalidRegister { index, context })
    }

    /// Read an address operand: a 4-byte literal, or `0xFF <reg>` taking the
    /// effective address from the register.
    pub(crate) fn read_addr_operand(&mut self) -> Result<u32> {
        if self.ip >= self.program_size {
            return Err(RuntimeError::FetchAddrOperand);
        }
        let operand = if self.memory.read_u8(self.ip)? == INDIRECT_PREFIX {
            self.ip += 1;
            AddrOperand::Indirect(self.read_reg("address operand")?)
        } else {
            AddrOperand::Immediate(self.read_u32()?)
        };
        Ok(operand.resolve(&self.registers))
    }

    // ========================================================================
    // Stack discipline, shared by PUSH/POP and CALL/RET.
    // ========================================================================

    pub(crate) fn push(&mut self, value: u32, context: &'static str) -> Result<()> {
        if self.sp as usize >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow { context });
        }
        self.stack[self.sp as usize] = value;
        self.sp += 1;
        Ok(())
    }

    pub(crate) fn pop(&mut self, context: &'static str) -> Result<u32> {
        if self.sp == 0 {
            return Err(RuntimeError::StackUnderflow { context });
        }
        self.sp -= 1;
        Ok(self.stack[self.sp as usize])
    }

    fn trace_state(&mut self) {
        let mut line = format!(
            "DEBUG: IP: {}, SP: {}, Flags: {}\nRegisters: ",
            self.ip, self.sp, self.flags
        );
        for (i, value) in self.registers.iter().enumerate() {
            line.push_str(&format!("R{}={} ", i, value));
        }
        let _ = writeln!(self.console.output, "{}", line);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    pub(crate) fn test_vm(code: &[u8]) -> Vm {
        let console = Console::from_streams(
            Box::new(Cursor::new(Vec::new())),
            Box::new(Vec::new()),
        );
        let mut vm = Vm::with_console(console).unwrap();
        vm.load(&Program::new(code.to_vec())).unwrap();
        vm
    }

    #[test]
    fn test_empty_program_halts() {
        let mut vm = test_vm(&[]);
        vm.run();
        assert!(!vm.running);
        assert!(!vm.error_occurred);
    }

    #[test]
    fn test_ip_past_program_halts() {
        // A single NOP; the next iteration sees ip == program_size.
        let mut vm = test_vm(&[0x00]);
        vm.run();
        assert!(!vm.running);
        assert!(!vm.error_occurred);
        assert_eq!(vm.ip, 1);
    }

    #[test]
    fn test_top_level_ff_terminates_silently() {
        let mut vm = test_vm(&[0xFF, 0x00, 0x00]);
        vm.run();
        assert!(!vm.error_occurred);
        assert_eq!(vm.ip, 1);
    }

    #[test]
    fn test_unknown_opcode_faults() {
        let mut vm = test_vm(&[0x99]);
        vm.run();
        assert!(vm.error_occurred);
        assert!(matches!(
            vm.last_fault(),
            Some(RuntimeError::UnknownOpcode { opcode: 0x99 })
        ));
    }

    #[test]
    fn test_truncated_operand_faults() {
        // LOADI wants a register and a word; only the register is present.
        let mut vm = test_vm(&[0x15, 0x00]);
        vm.run();
        assert!(vm.error_occurred);
        assert!(matches!(vm.last_fault(), Some(RuntimeError::FetchWord)));
    }

    #[test]
    fn test_invalid_register_faults() {
        let mut vm = test_vm(&[0x15, 32, 0, 0, 0, 0]);
        vm.run();
        assert!(matches!(
            vm.last_fault(),
            Some(RuntimeError::InvalidRegister { index: 32, context: "LOADI" })
        ));
    }

    #[test]
    fn test_no_mutation_after_fault() {
        // Fault on DIV by zero; the following LOADI must not run.
        let mut vm = test_vm(&[
            0x23, 0x02, 0x00, 0x01, // DIV R2, R0, R1 (R1 = 0)
            0x15, 0x05, 0x07, 0, 0, 0, // LOADI R5, 7
            0x01,
        ]);
        vm.run();
        assert!(vm.error_occurred);
        assert_eq!(vm.registers[5], 0);
    }
}
