//! Line preprocessing and value parsing.
//!
//! A source line is `[label:] instruction [; comment]`. Comment and label
//! splitting are quote-aware so string directives may contain `;` and `:`.

use std::collections::HashMap;

/// Flag-name operands accepted wherever a value may appear.
/// GE is a synonym for GT.
pub fn flag_value(name: &str) -> Option<i64> {
    match name {
        "EQ" => Some(0x01),
        "NE" => Some(0x02),
        "LT" => Some(0x04),
        "GT" | "GE" => Some(0x08),
        _ => None,
    }
}

/// Cut the line at the first `;` outside quotes.
pub fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, ch) in line.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == ';' => return &line[..i],
            None => {}
        }
    }
    line
}

/// Split a leading `label:` off a line, quote-aware.
pub fn split_label(line: &str) -> (Option<&str>, &str) {
    let mut quote: Option<char> = None;
    for (i, ch) in line.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == ':' => {
                return (Some(line[..i].trim()), line[i + 1..].trim());
            }
            None => {}
        }
    }
    (None, line)
}

/// Strip the comment, trim, and separate the label.
pub fn preprocess(line: &str) -> (Option<&str>, &str) {
    let line = strip_comment(line).trim();
    if line.is_empty() {
        return (None, "");
    }
    split_label(line)
}

/// True for a register token `R<n>`.
pub fn is_register_token(text: &str) -> bool {
    let rest = match text.strip_prefix('R') {
        Some(rest) => rest,
        None => return false,
    };
    !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a register token to its index.
pub fn register_index(text: &str) -> Option<i64> {
    if is_register_token(text) {
        text[1..].parse().ok()
    } else {
        None
    }
}

/// Parse an argument to a numeric value.
///
/// Accepted forms, in order: flag name, bracketed `[X]` (brackets stripped),
/// register `R<n>` (its index), hex `0x...`, decimal, character literal
/// `'c'`, defined label.
pub fn parse_value(arg: &str, symbols: &HashMap<String, i64>) -> Option<i64> {
    let mut arg = arg.trim();

    if let Some(value) = flag_value(arg) {
        return Some(value);
    }

    if arg.starts_with('[') && arg.ends_with(']') {
        arg = arg[1..arg.len() - 1].trim();
    }

    if let Some(index) = register_index(arg) {
        return Some(index);
    }

    if let Some(hex) = arg.strip_prefix("0x") {
        let value = i64::from_str_radix(hex, 16).ok()?;
        // 32-bit literal range.
        if !(-(1i64 << 31)..(1i64 << 31)).contains(&value) {
            return None;
        }
        return Some(value);
    }

    if let Ok(value) = arg.parse::<i64>() {
        return Some(value);
    }

    if arg.len() == 3 && arg.starts_with('\'') && arg.ends_with('\'') {
        return Some(arg.as_bytes()[1] as i64);
    }

    symbols.get(arg).copied()
}

/// True when the argument is the register-indirect address form `[R<n>]`.
pub fn bracketed_register(arg: &str) -> Option<i64> {
    let arg = arg.trim();
    if arg.starts_with('[') && arg.ends_with(']') {
        register_index(arg[1..arg.len() - 1].trim())
    } else {
        None
    }
}

/// Process backslash escapes in a string-directive body.
pub fn unescape(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('x') => {
                let hi = chars.next().ok_or("truncated \\x escape")?;
                let lo = chars.next().ok_or("truncated \\x escape")?;
                let byte = u8::from_str_radix(&format!("{}{}", hi, lo), 16)
                    .map_err(|_| format!("bad \\x escape '\\x{}{}'", hi, lo))?;
                out.push(byte as char);
            }
            Some(other) => return Err(format!("unknown escape '\\{}'", other)),
            None => return Err("trailing backslash".to_string()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_symbols() -> HashMap<String, i64> {
        HashMap::new()
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("ADD R1, R2, R3 ; sum"), "ADD R1, R2, R3 ");
        assert_eq!(strip_comment(".ASCIIZ \"a;b\""), ".ASCIIZ \"a;b\"");
        assert_eq!(strip_comment("; whole line"), "");
    }

    #[test]
    fn test_split_label() {
        assert_eq!(split_label("loop: JUMP loop"), (Some("loop"), "JUMP loop"));
        assert_eq!(split_label("HALT"), (None, "HALT"));
        assert_eq!(split_label("msg: .ASCIIZ \"a:b\""), (Some("msg"), ".ASCIIZ \"a:b\""));
        assert_eq!(split_label("only:"), (Some("only"), ""));
    }

    #[test]
    fn test_parse_value_forms() {
        let symbols = no_symbols();
        assert_eq!(parse_value("EQ", &symbols), Some(0x01));
        assert_eq!(parse_value("GE", &symbols), Some(0x08));
        assert_eq!(parse_value("R7", &symbols), Some(7));
        assert_eq!(parse_value("0x1F", &symbols), Some(0x1F));
        assert_eq!(parse_value("42", &symbols), Some(42));
        assert_eq!(parse_value("-1", &symbols), Some(-1));
        assert_eq!(parse_value("'A'", &symbols), Some(65));
        assert_eq!(parse_value("[0x200]", &symbols), Some(0x200));
        assert_eq!(parse_value("[R5]", &symbols), Some(5));
        assert_eq!(parse_value("nope", &symbols), None);
    }

    #[test]
    fn test_parse_value_labels() {
        let mut symbols = no_symbols();
        symbols.insert("start".to_string(), 0x40);
        assert_eq!(parse_value("start", &symbols), Some(0x40));
        assert_eq!(parse_value("[start]", &symbols), Some(0x40));
    }

    #[test]
    fn test_hex_range() {
        let symbols = no_symbols();
        assert_eq!(parse_value("0x7FFFFFFF", &symbols), Some(0x7FFF_FFFF));
        assert_eq!(parse_value("0xFFFFFFFF", &symbols), None);
    }

    #[test]
    fn test_bracketed_register() {
        assert_eq!(bracketed_register("[R3]"), Some(3));
        assert_eq!(bracketed_register("[ R12 ]"), Some(12));
        assert_eq!(bracketed_register("[0x10]"), None);
        assert_eq!(bracketed_register("R3"), None);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a\\nb").unwrap(), "a\nb");
        assert_eq!(unescape("tab\\there").unwrap(), "tab\there");
        assert_eq!(unescape("\\x41").unwrap(), "A");
        assert_eq!(unescape("plain").unwrap(), "plain");
        assert!(unescape("bad\\q").is_err());
        assert!(unescape("trail\\").is_err());
    }
}
