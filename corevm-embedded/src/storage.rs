//! RAM image with file-backed persistence.
//!
//! The full 4 KiB image is written to a backing file on demand and read back
//! on reset. The file is created lazily; a short read on restore is reported
//! but never fatal.

use crate::MEM_SIZE;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Storage {
    ram: Vec<u8>,
    path: PathBuf,
}

impl Storage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Storage {
            ram: vec![0; MEM_SIZE],
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the backing file when it does not exist yet.
    pub fn init(&mut self) {
        if !self.path.exists() && File::create(&self.path).is_err() {
            eprintln!("Failed to create system data file");
        }
    }

    /// Out-of-range reads return 0.
    #[inline]
    pub fn read(&self, address: u32) -> u8 {
        self.ram.get(address as usize).copied().unwrap_or(0)
    }

    /// Out-of-range writes are ignored.
    #[inline]
    pub fn write(&mut self, address: u32, value: u8) {
        if let Some(slot) = self.ram.get_mut(address as usize) {
            *slot = value;
        }
    }

    pub fn fill(&mut self, value: u8) {
        self.ram.fill(value);
    }

    /// Write the full RAM image to the backing file.
    pub fn persist(&self) {
        if std::fs::write(&self.path, &self.ram).is_err() {
            eprintln!("Failed to persist state");
        }
    }

    /// Read the RAM image back. Short reads are reported, not fatal.
    pub fn restore(&mut self) {
        match File::open(&self.path) {
            Ok(mut file) => {
                let mut image = vec![0u8; MEM_SIZE];
                let mut filled = 0;
                while filled < MEM_SIZE {
                    match file.read(&mut image[filled..]) {
                        Ok(0) => break,
                        Ok(n) => filled += n,
                        Err(_) => break,
                    }
                }
                if filled != MEM_SIZE {
                    eprintln!(
                        "Warning: Expected {} bytes, but read {} bytes",
                        MEM_SIZE, filled
                    );
                }
                self.ram[..filled].copy_from_slice(&image[..filled]);
            }
            Err(_) => eprintln!("Failed to restore state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::new(dir.path().join("data.dat"));
        storage.write(0, 0xAA);
        storage.write(MEM_SIZE as u32 - 1, 0xBB);
        assert_eq!(storage.read(0), 0xAA);
        assert_eq!(storage.read(MEM_SIZE as u32 - 1), 0xBB);
    }

    #[test]
    fn test_out_of_range_soft() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::new(dir.path().join("data.dat"));
        storage.write(MEM_SIZE as u32, 0xCC);
        assert_eq!(storage.read(MEM_SIZE as u32), 0);
        assert_eq!(storage.read(u32::MAX), 0);
    }

    #[test]
    fn test_init_creates_file_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.dat");
        let mut storage = Storage::new(&path);
        assert!(!path.exists());
        storage.init();
        assert!(path.exists());
    }

    #[test]
    fn test_persist_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.dat");

        let mut storage = Storage::new(&path);
        storage.write(7, 42);
        storage.write(4000, 17);
        storage.persist();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), MEM_SIZE as u64);

        let mut fresh = Storage::new(&path);
        fresh.restore();
        assert_eq!(fresh.read(7), 42);
        assert_eq!(fresh.read(4000), 17);
    }

    #[test]
    fn test_short_image_restores_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.dat");
        std::fs::write(&path, [9u8, 8, 7]).unwrap();

        let mut storage = Storage::new(&path);
        storage.restore();
        assert_eq!(storage.read(0), 9);
        assert_eq!(storage.read(2), 7);
        assert_eq!(storage.read(3), 0);
    }
}
