//! Console abstraction for the standard streams.
//!
//! The machine owns one input and one output stream; the reserved file-table
//! slots route through these. Production machines use the process stdin and
//! stdout; tests inject in-memory streams.

use std::io::{self, BufRead, Write};

pub struct Console {
    pub input: Box<dyn BufRead>,
    pub output: Box<dyn Write>,
}

impl Console {
    /// Console over the process standard streams.
    pub fn stdio() -> Self {
        Console {
            input: Box::new(io::stdin().lock()),
            output: Box::new(io::stdout()),
        }
    }

    /// Console over caller-supplied streams.
    pub fn from_streams(input: Box<dyn BufRead>, output: Box<dyn Write>) -> Self {
        Console { input, output }
    }

    /// Read a decimal integer, scanf-`%d` style: skip leading whitespace,
    /// accept an optional sign, consume digits. Returns `None` on EOF or
    /// when no digits follow.
    pub fn read_int(&mut self) -> Option<i64> {
        self.skip_whitespace()?;

        let mut text = String::new();
        {
            let buf = self.input.fill_buf().ok()?;
            if buf.is_empty() {
                return None;
            }
            if buf[0] == b'-' || buf[0] == b'+' {
                text.push(buf[0] as char);
                self.input.consume(1);
            }
        }

        loop {
            let (digits, done) = {
                let buf = self.input.fill_buf().ok()?;
                let n = buf.iter().take_while(|b| b.is_ascii_digit()).count();
                (
                    String::from_utf8_lossy(&buf[..n]).into_owned(),
                    n < buf.len() || buf.is_empty(),
                )
            };
            let consumed = digits.len();
            text.push_str(&digits);
            self.input.consume(consumed);
            if done {
                break;
            }
        }

        if text.is_empty() || text == "-" || text == "+" {
            return None;
        }
        text.parse().ok()
    }

    fn skip_whitespace(&mut self) -> Option<()> {
        loop {
            let (skip, more) = {
                let buf = self.input.fill_buf().ok()?;
                if buf.is_empty() {
                    return None;
                }
                let n = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
                (n, n == buf.len())
            };
            self.input.consume(skip);
            if !more {
                return Some(());
            }
        }
    }

    /// Read and discard one line (BREAK resumption).
    pub fn wait_for_line(&mut self) {
        let mut line = String::new();
        let _ = self.input.read_line(&mut line);
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::stdio()
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn console_with(input: &str) -> Console {
        Console::from_streams(Box::new(Cursor::new(input.as_bytes().to_vec())), Box::new(Vec::new()))
    }

    #[test]
    fn test_read_int_simple() {
        assert_eq!(console_with("42").read_int(), Some(42));
    }

    #[test]
    fn test_read_int_skips_whitespace() {
        assert_eq!(console_with("  \n\t 123\n").read_int(), Some(123));
    }

    #[test]
    fn test_read_int_negative() {
        assert_eq!(console_with("-7").read_int(), Some(-7));
    }

    #[test]
    fn test_read_int_stops_at_nondigit() {
        let mut console = console_with("12abc");
        assert_eq!(console.read_int(), Some(12));
    }

    #[test]
    fn test_read_int_failure() {
        assert_eq!(console_with("abc").read_int(), None);
        assert_eq!(console_with("").read_int(), None);
        assert_eq!(console_with("-x").read_int(), None);
    }

    #[test]
    fn test_read_int_sequence() {
        let mut console = console_with("3 17\n-2");
        assert_eq!(console.read_int(), Some(3));
        assert_eq!(console.read_int(), Some(17));
        assert_eq!(console.read_int(), Some(-2));
        assert_eq!(console.read_int(), None);
    }
}
