//! Two-pass compilation: layout (sizes and label offsets), then emission.

use crate::error::{AssemblerError, Result};
use crate::expand::expand_line;
use crate::parser::{bracketed_register, parse_value, preprocess, unescape};
use corevm_spec::{AddrOperand, Opcode, Program, Register};
use std::collections::HashMap;

/// Operand kinds an instruction signature is made of.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// One register byte.
    Reg,
    /// One flag-mask byte.
    Flags,
    /// Four-byte little-endian immediate.
    Imm,
    /// Four-byte address, or the two-byte `[R<n>]` indirect form.
    Addr,
}

use ArgKind::{Addr, Flags, Imm, Reg};

/// Mnemonic table: opcode plus operand signature.
pub fn signature(mnemonic: &str) -> Option<(Opcode, &'static [ArgKind])> {
    let entry: (Opcode, &'static [ArgKind]) = match mnemonic {
        "NOP" => (Opcode::Nop, &[]),
        "HALT" => (Opcode::Halt, &[]),
        "JUMP" => (Opcode::Jump, &[Addr]),
        "CALL" => (Opcode::Call, &[Addr]),
        "RET" => (Opcode::Ret, &[]),
        "IF" => (Opcode::If, &[Flags, Addr]),
        "LOAD" => (Opcode::Load, &[Reg, Addr]),
        "STORE" => (Opcode::Store, &[Reg, Addr]),
        "MOVE" => (Opcode::Move, &[Reg, Reg]),
        "PUSH" => (Opcode::Push, &[Reg]),
        "POP" => (Opcode::Pop, &[Reg]),
        "LOADI" => (Opcode::Loadi, &[Reg, Imm]),
        "ADD" => (Opcode::Add, &[Reg, Reg, Reg]),
        "SUB" => (Opcode::Sub, &[Reg, Reg, Reg]),
        "MUL" => (Opcode::Mul, &[Reg, Reg, Reg]),
        "DIV" => (Opcode::Div, &[Reg, Reg, Reg]),
        "AND" => (Opcode::And, &[Reg, Reg, Reg]),
        "OR" => (Opcode::Or, &[Reg, Reg, Reg]),
        "XOR" => (Opcode::Xor, &[Reg, Reg, Reg]),
        "NOT" => (Opcode::Not, &[Reg, Reg]),
        "CMP" => (Opcode::Cmp, &[Reg, Imm]),
        "FS_LIST" => (Opcode::FsList, &[Addr]),
        "ENV_LIST" => (Opcode::EnvList, &[Addr]),
        "PRINT" => (Opcode::Print, &[Reg]),
        "INPUT" => (Opcode::Input, &[Reg]),
        "PRINTS" => (Opcode::Prints, &[Addr]),
        "SHL" => (Opcode::Shl, &[Reg, Reg, Imm]),
        "SHR" => (Opcode::Shr, &[Reg, Reg, Imm]),
        "BREAK" => (Opcode::Break, &[]),
        "SNAPSHOT" => (Opcode::Snapshot, &[]),
        "RESTORE" => (Opcode::Restore, &[]),
        "OPEN" => (Opcode::FileOpen, &[Reg, Reg, Reg]),
        "READ" => (Opcode::FileRead, &[Reg, Reg, Reg, Reg]),
        "WRITE" => (Opcode::FileWrite, &[Reg, Reg, Reg, Reg]),
        "CLOSE" => (Opcode::FileClose, &[Reg]),
        "SEEK" => (Opcode::FileSeek, &[Reg, Imm, Imm, Reg]),
        _ => return None,
    };
    Some(entry)
}

fn split_mnemonic(instr: &str) -> (String, &str) {
    let first = instr.split_whitespace().next().unwrap_or_default();
    let mnemonic = first.to_uppercase();
    let args = instr[first.len()..].trim();
    (mnemonic, args)
}

fn split_args(args: &str) -> Vec<&str> {
    if args.is_empty() {
        Vec::new()
    } else {
        args.split(',').map(str::trim).collect()
    }
}

pub struct AsmCompiler {
    symbols: HashMap<String, i64>,
    code: Vec<u8>,
}

impl AsmCompiler {
    pub fn new() -> Self {
        AsmCompiler {
            symbols: HashMap::new(),
            code: Vec::new(),
        }
    }

    /// Compile a full source text to bytecode.
    pub fn compile(&mut self, source: &str) -> Result<Vec<u8>> {
        let mut lines = Vec::new();
        for (i, line) in source.lines().enumerate() {
            lines.extend(expand_line(line, i + 1)?);
        }

        // Pass 1: sizes and label offsets.
        self.symbols.clear();
        let mut offset: i64 = 0;
        for (i, line) in lines.iter().enumerate() {
            let (label, instr) = preprocess(line);
            if let Some(label) = label {
                if self.symbols.contains_key(label) {
                    return Err(AssemblerError::DuplicateLabel {
                        line: i + 1,
                        label: label.to_string(),
                    });
                }
                self.symbols.insert(label.to_string(), offset);
            }
            if !instr.is_empty() {
                offset += self.line_size(instr, i + 1)? as i64;
            }
        }

        // Pass 2: emission.
        self.code.clear();
        for (i, line) in lines.iter().enumerate() {
            self.emit_line(line, i + 1)?;
        }
        Ok(self.code.clone())
    }

    /// Encoded size of one instruction or directive, in bytes.
    fn line_size(&self, instr: &str, line_number: usize) -> Result<u32> {
        if instr.starts_with('.') {
            return self.directive_size(instr, line_number);
        }

        let (mnemonic, args) = split_mnemonic(instr);
        let (_, kinds) = signature(&mnemonic).ok_or_else(|| AssemblerError::UnknownInstruction {
            line: line_number,
            mnemonic: mnemonic.clone(),
        })?;
        let args = split_args(args);
        if args.len() != kinds.len() {
            return Err(AssemblerError::WrongArgCount {
                line: line_number,
                mnemonic,
            });
        }

        let mut size = 1;
        for (kind, arg) in kinds.iter().zip(&args) {
            size += match kind {
                Reg | Flags => 1,
                Imm | Addr => {
                    if bracketed_register(arg).is_some() {
                        2
                    } else {
                        4
                    }
                }
            };
        }
        Ok(size)
    }

    fn directive_size(&self, instr: &str, line_number: usize) -> Result<u32> {
        let (directive, args) = split_mnemonic(instr);
        match directive.as_str() {
            ".ASCIIZ" => {
                let body = args.trim_matches(|c| c == '"' || c == '\'');
                let text = unescape(body).map_err(|text| AssemblerError::BadEscape {
                    line: line_number,
                    text,
                })?;
                Ok(text.len() as u32 + 1)
            }
            ".SPACE" => {
                let value = parse_value(args, &self.symbols).ok_or_else(|| {
                    AssemblerError::UnknownValue {
                        line: line_number,
                        value: args.to_string(),
                    }
                })?;
                Ok(value as u32)
            }
            ".BYTE" => Ok(1),
            ".WORD" => Ok(4),
            _ => Err(AssemblerError::UnknownDirective {
                line: line_number,
                directive,
            }),
        }
    }

    /// Emit the bytes for one line.
    fn emit_line(&mut self, line: &str, line_number: usize) -> Result<()> {
        let (_, instr) = preprocess(line);
        if instr.is_empty() {
            return Ok(());
        }

        if instr.starts_with('.') {
            return self.emit_directive(instr, line_number);
        }

        let (mnemonic, args) = split_mnemonic(instr);
        let (opcode, kinds) =
            signature(&mnemonic).ok_or_else(|| AssemblerError::UnknownInstruction {
                line: line_number,
                mnemonic: mnemonic.clone(),
            })?;
        let args = split_args(args);
        if args.len() != kinds.len() {
            return Err(AssemblerError::WrongArgCount {
                line: line_number,
                mnemonic,
            });
        }

        self.code.push(opcode.to_u8());
        for (kind, arg) in kinds.iter().zip(&args) {
            match kind {
                Reg | Flags => {
                    let value = self.require_value(arg, line_number)?;
                    self.code.push(value as u8);
                }
                Imm | Addr => {
                    let operand = if let Some(reg) = bracketed_register(arg) {
                        let reg = Register::from_index(reg as usize).ok_or_else(|| {
                            AssemblerError::UnknownValue {
                                line: line_number,
                                value: arg.to_string(),
                            }
                        })?;
                        AddrOperand::Indirect(reg)
                    } else {
                        AddrOperand::Immediate(self.require_value(arg, line_number)? as u32)
                    };
                    operand.encode(&mut self.code);
                }
            }
        }
        Ok(())
    }

    fn emit_directive(&mut self, instr: &str, line_number: usize) -> Result<()> {
        let (directive, args) = split_mnemonic(instr);
        match directive.as_str() {
            ".ASCIIZ" => {
                let body = args.trim_matches(|c| c == '"' || c == '\'');
                let text = unescape(body).map_err(|text| AssemblerError::BadEscape {
                    line: line_number,
                    text,
                })?;
                self.code.extend_from_slice(text.as_bytes());
                self.code.push(0);
            }
            ".SPACE" => {
                let value = self.require_value(args, line_number)?;
                self.code.extend(std::iter::repeat(0u8).take(value as usize));
            }
            ".BYTE" => {
                let value = self.require_value(args, line_number)?;
                self.code.push(value as u8);
            }
            ".WORD" => {
                let value = self.require_value(args, line_number)?;
                self.code.extend_from_slice(&(value as u32).to_le_bytes());
            }
            _ => {
                return Err(AssemblerError::UnknownDirective {
                    line: line_number,
                    directive,
                })
            }
        }
        Ok(())
    }

    fn require_value(&self, arg: &str, line_number: usize) -> Result<i64> {
        parse_value(arg, &self.symbols).ok_or_else(|| AssemblerError::UnknownValue {
            line: line_number,
            value: arg.to_string(),
        })
    }
}

impl Default for AsmCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source text into a program.
pub fn assemble(source: &str) -> Result<Program> {
    let mut compiler = AsmCompiler::new();
    let code = compiler.compile(source)?;
    Ok(Program::new(code))
}
