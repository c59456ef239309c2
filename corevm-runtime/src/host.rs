//! Host enumeration services: working-directory and environment listings.
//!
//! Both produce newline-joined entries in a buffer capped at
//! `LIST_BUFFER_SIZE` bytes; an entry that would not fit (counting its
//! newline and the trailing NUL) stops the enumeration.

use corevm_spec::LIST_BUFFER_SIZE;

/// Append `entry` plus a newline when it fits under the cap.
fn push_entry(buffer: &mut String, entry: &str) -> bool {
    if buffer.len() + entry.len() + 2 < LIST_BUFFER_SIZE {
        buffer.push_str(entry);
        buffer.push('\n');
        true
    } else {
        false
    }
}

/// Newline-joined entries of the current working directory.
/// On enumeration failure the buffer carries the error text instead.
pub fn list_cwd() -> String {
    let mut buffer = String::new();
    match std::fs::read_dir(".") {
        Ok(entries) => {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if !push_entry(&mut buffer, &name.to_string_lossy()) {
                    break;
                }
            }
        }
        Err(err) => buffer = format!("Error: {}", err),
    }
    buffer
}

/// Newline-joined `NAME=value` entries of the process environment.
pub fn list_env() -> String {
    let mut buffer = String::new();
    for (key, value) in std::env::vars() {
        let entry = format!("{}={}", key, value);
        if !push_entry(&mut buffer, &entry) {
            break;
        }
    }
    buffer
}
