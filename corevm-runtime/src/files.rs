//! The machine's file table.
//!
//! Sixteen slots; slots 0-2 are reserved for the standard streams, installed
//! at init and reinstalled on restore. FILE_OPEN allocates slots 3-15;
//! FILE_CLOSE on a reserved slot is a no-op.

use corevm_spec::{MAX_FILES, RESERVED_FILES};
use std::fs::{File, OpenOptions};

/// One open handle. Reserved stream slots are markers; the machine routes
/// them through its console.
#[derive(Debug)]
pub enum Handle {
    Stdin,
    Stdout,
    Stderr,
    File(File),
}

#[derive(Debug)]
pub struct FileTable {
    slots: [Option<Handle>; MAX_FILES],
}

impl FileTable {
    pub fn new() -> Self {
        let mut table = FileTable {
            slots: std::array::from_fn(|_| None),
        };
        table.install_reserved();
        table
    }

    fn install_reserved(&mut self) {
        self.slots[0] = Some(Handle::Stdin);
        self.slots[1] = Some(Handle::Stdout);
        self.slots[2] = Some(Handle::Stderr);
    }

    /// Whether `fd` names an open slot.
    pub fn is_open(&self, fd: u32) -> bool {
        (fd as usize) < MAX_FILES && self.slots[fd as usize].is_some()
    }

    pub fn get_mut(&mut self, fd: u32) -> Option<&mut Handle> {
        self.slots.get_mut(fd as usize)?.as_mut()
    }

    /// Place a file in the first free non-reserved slot.
    pub fn allocate(&mut self, file: File) -> Option<u32> {
        for i in RESERVED_FILES..MAX_FILES {
            if self.slots[i].is_none() {
                self.slots[i] = Some(Handle::File(file));
                return Some(i as u32);
            }
        }
        None
    }

    /// Close a non-reserved slot. Returns false when the handle is invalid.
    /// Reserved slots report success without closing anything.
    pub fn close(&mut self, fd: u32) -> bool {
        let i = fd as usize;
        if i < RESERVED_FILES {
            return true;
        }
        if i >= MAX_FILES || self.slots[i].is_none() {
            return false;
        }
        self.slots[i] = None;
        true
    }

    /// Drop every non-reserved handle and reinstall the stream slots.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut().skip(RESERVED_FILES) {
            *slot = None;
        }
        self.install_reserved();
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate an fopen-style mode string into open options.
/// Unknown modes yield `None`, which surfaces as an open failure.
pub fn open_options(mode: &str) -> Option<OpenOptions> {
    let mut chars = mode.chars();
    let primary = chars.next()?;
    let rest: String = chars.collect();
    let plus = rest.contains('+');

    let mut opts = OpenOptions::new();
    match primary {
        'r' => {
            opts.read(true);
            if plus {
                opts.write(true);
            }
        }
        'w' => {
            opts.write(true).create(true).truncate(true);
            if plus {
                opts.read(true);
            }
        }
        'a' => {
            opts.append(true).create(true);
            if plus {
                opts.read(true);
            }
        }
        _ => return None,
    }
    // 'b' is accepted and ignored, as on POSIX.
    if rest.chars().any(|c| c != '+' && c != 'b') {
        return None;
    }
    Some(opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reserved_slots_installed() {
        let table = FileTable::new();
        assert!(table.is_open(0));
        assert!(table.is_open(1));
        assert!(table.is_open(2));
        assert!(!table.is_open(3));
        assert!(!table.is_open(16));
    }

    #[test]
    fn test_allocate_starts_after_reserved() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = FileTable::new();
        let path = dir.path().join("a.txt");
        let fd = table.allocate(File::create(&path).unwrap()).unwrap();
        assert_eq!(fd, 3);
        let fd2 = table.allocate(File::create(&path).unwrap()).unwrap();
        assert_eq!(fd2, 4);
    }

    #[test]
    fn test_table_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let mut table = FileTable::new();
        for _ in RESERVED_FILES..MAX_FILES {
            assert!(table.allocate(File::create(&path).unwrap()).is_some());
        }
        assert!(table.allocate(File::create(&path).unwrap()).is_none());
    }

    #[test]
    fn test_close_reserved_is_noop() {
        let mut table = FileTable::new();
        assert!(table.close(0));
        assert!(table.close(2));
        assert!(table.is_open(0));
        assert!(table.is_open(2));
    }

    #[test]
    fn test_close_invalid() {
        let mut table = FileTable::new();
        assert!(!table.close(3));
        assert!(!table.close(99));
    }

    #[test]
    fn test_reset_drops_files_keeps_streams() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = FileTable::new();
        let fd = table
            .allocate(File::create(dir.path().join("x")).unwrap())
            .unwrap();
        table.reset();
        assert!(!table.is_open(fd));
        assert!(table.is_open(0) && table.is_open(1) && table.is_open(2));
    }

    #[test]
    fn test_open_options_modes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.txt");

        // "w" creates and truncates.
        let mut f = open_options("w").unwrap().open(&path).unwrap();
        f.write_all(b"data").unwrap();
        drop(f);

        // "r" reads.
        assert!(open_options("r").unwrap().open(&path).is_ok());
        // "rb" and "r+" are accepted.
        assert!(open_options("rb").unwrap().open(&path).is_ok());
        assert!(open_options("r+").unwrap().open(&path).is_ok());
        // Garbage is rejected.
        assert!(open_options("q").is_none());
        assert!(open_options("").is_none());
        assert!(open_options("rw").is_none());
    }
}
