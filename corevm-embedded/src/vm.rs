//! The embedded interpreter.
//!
//! Eight registers, 4 KiB of RAM shared between code and data, a 256-word
//! stack growing downward from `sp = STACK_SIZE`, and big-endian 32-bit
//! words in the instruction stream. Errors are reported on the console and
//! stop the interpreter or fail soft; there is no fault state.

use crate::opcode::EmbeddedOpcode;
use crate::storage::Storage;
use crate::{MEM_SIZE, NUM_REGS, STACK_SIZE, SYSTEM_DATA_PATH};
use std::path::PathBuf;

#[derive(Debug)]
pub struct EmbeddedVm {
    storage: Storage,
    reg: [u32; NUM_REGS],
    stack: [u32; STACK_SIZE],
    sp: u32,
    pc: u32,
    running: bool,
}

impl EmbeddedVm {
    /// Boot a machine persisting to the default system data file.
    pub fn new() -> Self {
        Self::with_backing(PathBuf::from(SYSTEM_DATA_PATH))
    }

    /// Boot a machine persisting to a caller-chosen file.
    pub fn with_backing(path: impl Into<PathBuf>) -> Self {
        let mut vm = EmbeddedVm {
            storage: Storage::new(path),
            reg: [0; NUM_REGS],
            stack: [0; STACK_SIZE],
            sp: STACK_SIZE as u32,
            pc: 0,
            running: false,
        };
        vm.reset();
        vm
    }

    /// Zero the registers, rewind, mount the backing store, and restore the
    /// RAM image when one exists.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.sp = STACK_SIZE as u32;
        self.running = false;
        self.reg = [0; NUM_REGS];
        self.storage.init();
        self.storage.restore();
    }

    /// Big-endian word read; out-of-bounds reports and yields 0.
    fn read32(&self, address: u32) -> u32 {
        if address as usize + 3 >= MEM_SIZE {
            eprintln!("read32: Address 0x{:04X} out of bounds", address);
            return 0;
        }
        (u32::from(self.storage.read(address)) << 24)
            | (u32::from(self.storage.read(address + 1)) << 16)
            | (u32::from(self.storage.read(address + 2)) << 8)
            | u32::from(self.storage.read(address + 3))
    }

    /// Big-endian word write; out-of-bounds reports and is ignored.
    fn write32(&mut self, address: u32, value: u32) {
        if address as usize + 3 >= MEM_SIZE {
            eprintln!("write32: Address 0x{:04X} out of bounds", address);
            return;
        }
        self.storage.write(address, (value >> 24) as u8);
        self.storage.write(address + 1, (value >> 16) as u8);
        self.storage.write(address + 2, (value >> 8) as u8);
        self.storage.write(address + 3, value as u8);
    }

    /// Copy up to `MEM_SIZE` bytes of bytecode to RAM offset 0 and rewind.
    pub fn load_program(&mut self, program: &[u8]) {
        let size = program.len().min(MEM_SIZE);
        for (i, byte) in program[..size].iter().enumerate() {
            self.storage.write(i as u32, *byte);
        }
        self.pc = 0;
    }

    /// Interpret from the current program counter until HALT, an
    /// unrecognised opcode, or the end of RAM.
    pub fn run(&mut self) {
        self.running = true;
        while self.running && (self.pc as usize) < MEM_SIZE {
            let opcode = self.storage.read(self.pc);
            self.pc += 1;
            match EmbeddedOpcode::from_u8(opcode) {
                Some(EmbeddedOpcode::Load) => {
                    let reg_num = self.storage.read(self.pc);
                    self.pc += 1;
                    let value = self.read32(self.pc);
                    if (reg_num as usize) < NUM_REGS {
                        self.reg[reg_num as usize] = value;
                    } else {
                        eprintln!("LOAD: Invalid register number: {}", reg_num);
                    }
                    self.pc += 4;
                }
                Some(EmbeddedOpcode::Store) => {
                    let reg_num = self.storage.read(self.pc);
                    self.pc += 1;
                    let address = self.read32(self.pc);
                    if (reg_num as usize) < NUM_REGS {
                        self.write32(address, self.reg[reg_num as usize]);
                    } else {
                        eprintln!("STORE: Invalid register number: {}", reg_num);
                    }
                    self.pc += 4;
                }
                Some(EmbeddedOpcode::Add) => {
                    let dst = self.storage.read(self.pc);
                    self.pc += 1;
                    let src1 = self.storage.read(self.pc);
                    self.pc += 1;
                    let src2 = self.storage.read(self.pc);
                    self.pc += 1;
                    if (dst as usize) < NUM_REGS
                        && (src1 as usize) < NUM_REGS
                        && (src2 as usize) < NUM_REGS
                    {
                        self.reg[dst as usize] =
                            self.reg[src1 as usize].wrapping_add(self.reg[src2 as usize]);
                    } else {
                        eprintln!("ADD: Invalid register number");
                    }
                }
                Some(EmbeddedOpcode::Halt) => {
                    self.running = false;
                }
                _ => {
                    eprintln!(
                        "Unknown opcode: 0x{:02X} at address 0x{:04X}",
                        opcode,
                        self.pc - 1
                    );
                    self.running = false;
                }
            }
        }
    }

    /// Push a word; the stack grows downward. Overflow fails soft.
    pub fn push(&mut self, value: u32) -> bool {
        if self.sp == 0 {
            eprintln!("Stack overflow");
            return false;
        }
        self.sp -= 1;
        self.stack[self.sp as usize] = value;
        true
    }

    /// Pop a word. Underflow fails soft.
    pub fn pop(&mut self) -> Option<u32> {
        if self.sp as usize >= STACK_SIZE {
            eprintln!("Stack underflow");
            return None;
        }
        let value = self.stack[self.sp as usize];
        self.sp += 1;
        Some(value)
    }

    /// Write the full RAM image to the backing file.
    pub fn persist_state(&self) {
        self.storage.persist();
    }

    pub fn reg(&self, index: usize) -> u32 {
        self.reg[index]
    }

    pub fn ram(&self, address: u32) -> u8 {
        self.storage.read(address)
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn sp(&self) -> u32 {
        self.sp
    }
}
