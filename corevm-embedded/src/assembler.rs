//! On-device line assembler and the `compile` command surface.
//!
//! One mnemonic per line. Empty lines and `#` comments are skipped;
//! unrecognised lines produce a diagnostic and are skipped. `push` carries a
//! decimal immediate byte, `LOAD`/`STORE` a hexadecimal address byte. The
//! output stream is capped at `MEM_SIZE` bytes and written atomically.

use crate::error::{EmbeddedError, Result};
use crate::opcode::EmbeddedOpcode;
use crate::MEM_SIZE;
use std::path::Path;

/// Result of assembling a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub bytes: Vec<u8>,
    pub diagnostics: Vec<String>,
}

/// Parse a leading decimal integer; anything else yields 0.
fn parse_decimal(text: &str) -> i64 {
    let text = text.trim();
    let negative = text.starts_with('-');
    let digits: String = text
        .chars()
        .skip(negative as usize)
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let value: i64 = digits.parse().unwrap_or(0);
    if negative {
        -value
    } else {
        value
    }
}

/// Parse a leading hexadecimal integer (optional `0x` prefix); else 0.
fn parse_hex(text: &str) -> i64 {
    let text = text.trim();
    let text = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(text);
    let digits: String = text.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
    i64::from_str_radix(&digits, 16).unwrap_or(0)
}

/// Operand text after the mnemonic word.
fn operand_of(line: &str) -> &str {
    match line.find(char::is_whitespace) {
        Some(i) => line[i..].trim(),
        None => "",
    }
}

/// Assemble a source text to the embedded byte stream.
pub fn assemble_source(source: &str) -> Assembly {
    let mut bytes = Vec::new();
    let mut diagnostics = Vec::new();

    for raw in source.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let opcode = match EmbeddedOpcode::from_mnemonic(line) {
            Some(opcode) => opcode,
            None => {
                diagnostics.push(format!("Unknown instruction: {}", line));
                continue;
            }
        };

        let needed = 1 + opcode.has_operand() as usize;
        if bytes.len() + needed > MEM_SIZE {
            break;
        }

        bytes.push(opcode.to_u8());
        match opcode {
            EmbeddedOpcode::Push => {
                bytes.push(parse_decimal(operand_of(line)) as u8);
            }
            EmbeddedOpcode::Load | EmbeddedOpcode::Store => {
                bytes.push((parse_hex(operand_of(line)) & 0xFF) as u8);
            }
            _ => {}
        }
    }

    Assembly { bytes, diagnostics }
}

/// Expand `$VAR` and `${VAR}` references against a caller-supplied lookup.
pub fn expand_variables(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        let braced = matches!(chars.peek(), Some((_, '{')));
        if braced {
            chars.next();
        }
        let mut name = String::new();
        while let Some((_, c)) = chars.peek().copied() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if braced {
            if let Some((_, '}')) = chars.peek().copied() {
                chars.next();
            }
        }
        if name.is_empty() {
            out.push('$');
            continue;
        }
        if let Some(value) = lookup(&name) {
            out.push_str(&value);
        }
    }
    out
}

/// Resolve a command-line path: expand variables, then prefix relative paths
/// with the current directory.
pub fn resolve_path(path: &str, cwd: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let expanded = expand_variables(path.trim(), lookup);
    if expanded.starts_with('/') {
        expanded
    } else if cwd == "/" {
        format!("/{}", expanded)
    } else {
        format!("{}/{}", cwd.trim_end_matches('/'), expanded)
    }
}

/// The shell's `compile <src> <dst>` surface: resolve both paths, assemble,
/// write the binary atomically, and return the emitted size.
///
/// Diagnostics for skipped lines go to stderr.
pub fn compile_command(
    src: &str,
    dst: &str,
    cwd: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<usize> {
    let input = resolve_path(src, cwd, lookup);
    let output = resolve_path(dst, cwd, lookup);

    let source =
        std::fs::read_to_string(&input).map_err(|_| EmbeddedError::Open(input.clone()))?;
    let assembly = assemble_source(&source);
    for diagnostic in &assembly.diagnostics {
        eprintln!("{}", diagnostic);
    }

    write_atomic(Path::new(&output), &assembly.bytes)
        .map_err(|_| EmbeddedError::Create(output.clone()))?;
    Ok(assembly.bytes.len())
}

/// Write via a temporary sibling file and rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_full_sample() {
        let source = "push 10\npush 20\nADD\nSTORE 0x01\nLOAD 0x01\nHALT\n";
        let assembly = assemble_source(source);
        assert!(assembly.diagnostics.is_empty());
        assert_eq!(
            assembly.bytes,
            vec![0x30, 0x0A, 0x30, 0x14, 0x20, 0x11, 0x01, 0x10, 0x01, 0x01]
        );
    }

    #[test]
    fn test_comments_and_blanks_skipped() {
        let assembly = assemble_source("# boot\n\n   \nHALT\n");
        assert_eq!(assembly.bytes, vec![0x01]);
        assert!(assembly.diagnostics.is_empty());
    }

    #[test]
    fn test_unknown_lines_diagnosed_and_skipped() {
        let assembly = assemble_source("push 1\nnope\nHALT\n");
        assert_eq!(assembly.bytes, vec![0x30, 0x01, 0x01]);
        assert_eq!(assembly.diagnostics, vec!["Unknown instruction: nope"]);
    }

    #[test]
    fn test_wrong_casing_is_unknown() {
        let assembly = assemble_source("PUSH 1\nadd\n");
        assert!(assembly.bytes.is_empty());
        assert_eq!(assembly.diagnostics.len(), 2);
    }

    #[test]
    fn test_push_operand_is_decimal_byte() {
        assert_eq!(assemble_source("push 255\n").bytes, vec![0x30, 0xFF]);
        assert_eq!(assemble_source("push 0\n").bytes, vec![0x30, 0x00]);
        // Garbage operand parses to 0.
        assert_eq!(assemble_source("push xyz\n").bytes, vec![0x30, 0x00]);
    }

    #[test]
    fn test_load_store_operand_is_hex_byte() {
        assert_eq!(assemble_source("LOAD 0xAB\n").bytes, vec![0x10, 0xAB]);
        assert_eq!(assemble_source("STORE 1F\n").bytes, vec![0x11, 0x1F]);
        // Only the low byte is kept.
        assert_eq!(assemble_source("LOAD 0x1FF\n").bytes, vec![0x10, 0xFF]);
    }

    #[test]
    fn test_output_capped_at_mem_size() {
        let source = "push 1\n".repeat(3000);
        let assembly = assemble_source(&source);
        assert!(assembly.bytes.len() <= MEM_SIZE);
        assert_eq!(assembly.bytes.len(), MEM_SIZE);
    }

    #[test]
    fn test_expand_variables() {
        let lookup = |name: &str| match name {
            "HOME" => Some("/home/user".to_string()),
            "X" => Some("1".to_string()),
            _ => None,
        };
        assert_eq!(expand_variables("$HOME/f", &lookup), "/home/user/f");
        assert_eq!(expand_variables("${HOME}/f", &lookup), "/home/user/f");
        assert_eq!(expand_variables("a$Xb", &lookup), "a");
        assert_eq!(expand_variables("$MISSING/f", &lookup), "/f");
        assert_eq!(expand_variables("plain", &lookup), "plain");
    }

    #[test]
    fn test_resolve_path() {
        let lookup = |name: &str| match name {
            "DIR" => Some("/data".to_string()),
            _ => None,
        };
        assert_eq!(resolve_path("/abs/p", "/work", &lookup), "/abs/p");
        assert_eq!(resolve_path("rel/p", "/", &lookup), "/rel/p");
        assert_eq!(resolve_path("rel/p", "/work", &lookup), "/work/rel/p");
        assert_eq!(resolve_path(" $DIR/f ", "/work", &lookup), "/data/f");
    }

    #[test]
    fn test_compile_command_writes_binary() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_str().unwrap();
        std::fs::write(dir.path().join("prog.s"), "push 10\nADD\nHALT\n").unwrap();

        let lookup = |_: &str| None;
        let size = compile_command("prog.s", "prog.bin", cwd, &lookup).unwrap();
        assert_eq!(size, 4);
        let bytes = std::fs::read(dir.path().join("prog.bin")).unwrap();
        assert_eq!(bytes, vec![0x30, 0x0A, 0x20, 0x01]);
    }

    #[test]
    fn test_compile_command_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_str().unwrap();
        let lookup = |_: &str| None;
        assert!(matches!(
            compile_command("absent.s", "out.bin", cwd, &lookup),
            Err(EmbeddedError::Open(_))
        ));
    }
}
