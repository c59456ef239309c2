//! Pseudo-instruction expansion.
//!
//! Runs before layout and rewrites source lines:
//! - `MOV Rd, X MOD Y` becomes a DIV/MUL/SUB sequence over the scratch
//!   registers R30/R31.
//! - Arithmetic mnemonics accept immediates in their source slots; each
//!   distinct immediate is materialised with LOADI into a scratch register.
//! - `SUB a, b` is sugar for `SUB a, a, b`.
//! - `CMP reg, reg` and `PRINTS "..."` are rejected with guidance.

use crate::error::{AssemblerError, Result};
use crate::parser::{is_register_token, preprocess};
use corevm_spec::Register;

fn is_arithmetic(mnemonic: &str) -> bool {
    matches!(mnemonic, "ADD" | "SUB" | "MUL" | "DIV" | "AND" | "OR" | "XOR")
}

fn split_operands(args: &str) -> Vec<String> {
    args.split(',').map(|op| op.trim().to_string()).collect()
}

/// Expand one source line into zero or more emitted lines.
pub fn expand_line(line: &str, line_number: usize) -> Result<Vec<String>> {
    let (label, instr) = preprocess(line);
    if instr.is_empty() {
        if label.is_some() {
            return Ok(vec![line.to_string()]);
        }
        return Ok(vec![]);
    }

    if instr.starts_with('.') {
        return Ok(vec![line.to_string()]);
    }

    let mnemonic = instr
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase();
    let args = instr[instr.split_whitespace().next().unwrap_or_default().len()..].trim();
    let prefix = label.map(|l| format!("{}: ", l)).unwrap_or_default();

    if mnemonic == "MOV" && args.split_whitespace().any(|w| w == "MOD") {
        return expand_mod(args, &prefix, line_number);
    }

    if is_arithmetic(&mnemonic) {
        let mut operands = split_operands(args);
        if mnemonic == "SUB" && operands.len() == 2 {
            operands = vec![operands[0].clone(), operands[0].clone(), operands[1].clone()];
        }
        if operands.len() != 3 {
            return Err(AssemblerError::WrongArgCount {
                line: line_number,
                mnemonic,
            });
        }
        return expand_immediates(&mnemonic, operands, &prefix, line_number);
    }

    if mnemonic == "CMP" {
        let operands = split_operands(args);
        if operands.len() == 2 && operands[1].starts_with('R') {
            return Err(AssemblerError::Unsupported {
                line: line_number,
                message: "CMP reg, reg is not supported; use CMP reg, imm".to_string(),
            });
        }
    }

    if mnemonic == "PRINTS" && args.starts_with('"') {
        return Err(AssemblerError::Unsupported {
            line: line_number,
            message: "PRINTS \"...\" is not supported; use .ASCIIZ and a label".to_string(),
        });
    }

    Ok(vec![line.to_string()])
}

/// `MOV Rd, X MOD Y` -> remainder computed via DIV/MUL/SUB on scratch regs.
fn expand_mod(args: &str, prefix: &str, line_number: usize) -> Result<Vec<String>> {
    let bad = || AssemblerError::SyntaxError {
        line: line_number,
        message: format!("invalid MOV with MOD: {}", args),
    };

    let (dest, rest) = args.split_once(',').ok_or_else(bad)?;
    let dest = dest.trim();
    let mut sides = rest.splitn(2, " MOD ");
    let x = sides.next().ok_or_else(bad)?.trim();
    let y = sides.next().ok_or_else(bad)?.trim();
    let operand_ok =
        |op: &str| is_register_token(op) || op.bytes().all(|b| b.is_ascii_digit()) && !op.is_empty();
    if !is_register_token(dest) || !operand_ok(x) || !operand_ok(y) {
        return Err(bad());
    }

    let (t0, t1) = (Register::SCRATCH0, Register::SCRATCH1);
    let mut lines = Vec::new();
    let x_reg = if is_register_token(x) {
        x.to_string()
    } else {
        lines.push(format!("LOADI {}, {}", t0, x));
        t0.to_string()
    };
    let y_reg = if is_register_token(y) {
        y.to_string()
    } else {
        lines.push(format!("LOADI {}, {}", t1, y));
        t1.to_string()
    };

    lines.push(format!("{}DIV {}, {}, {}", prefix, t0, x_reg, y_reg));
    lines.push(format!("MUL {}, {}, {}", t1, t0, y_reg));
    lines.push(format!("SUB {}, {}, {}", dest, x_reg, t1));
    Ok(lines)
}

/// Materialise immediate source operands of an arithmetic op via LOADI.
fn expand_immediates(
    mnemonic: &str,
    mut operands: Vec<String>,
    prefix: &str,
    line_number: usize,
) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut temp_used: Vec<(String, String)> = Vec::new();
    let mut next_temp = Register::SCRATCH0.index();

    for slot in 1..=2 {
        let op = operands[slot].clone();
        if op.starts_with('R') {
            continue;
        }
        if let Some((_, reg)) = temp_used.iter().find(|(imm, _)| *imm == op) {
            operands[slot] = reg.clone();
            continue;
        }
        if next_temp > Register::SCRATCH1.index() {
            return Err(AssemblerError::NoScratchRegisters { line: line_number });
        }
        let temp = format!("R{}", next_temp);
        next_temp += 1;
        lines.push(format!("LOADI {}, {}", temp, op));
        temp_used.push((op, temp.clone()));
        operands[slot] = temp;
    }

    lines.push(format!(
        "{}{} {}, {}, {}",
        prefix, mnemonic, operands[0], operands[1], operands[2]
    ));
    Ok(lines)
}
