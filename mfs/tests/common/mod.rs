//! Common utilities for tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use mfs::{BlockDevice, FileSystem, FsError, BLOCK_SIZE, NUM_BLOCKS};
use rand::Rng;

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr) => {
        println!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

/// In-memory block device. Clones share the same storage, so an image can be
/// closed and reopened.
#[derive(Clone)]
pub struct RamDisk {
    inner: Arc<Mutex<Vec<u8>>>,
    num_blocks: usize,
}

impl RamDisk {
    pub fn new(num_blocks: usize) -> Self {
        RamDisk {
            inner: Arc::new(Mutex::new(vec![0u8; num_blocks * BLOCK_SIZE])),
            num_blocks,
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.inner.lock().unwrap().clone()
    }

    pub fn poke(&self, offset: usize, bytes: &[u8]) {
        self.inner.lock().unwrap()[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> mfs::Result<()> {
        if block_id >= self.num_blocks || buf.len() != BLOCK_SIZE {
            return Err(FsError::Io(std::io::ErrorKind::InvalidInput.into()));
        }
        let start = block_id * BLOCK_SIZE;
        buf.copy_from_slice(&self.inner.lock().unwrap()[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> mfs::Result<()> {
        if block_id >= self.num_blocks || buf.len() != BLOCK_SIZE {
            return Err(FsError::Io(std::io::ErrorKind::InvalidInput.into()));
        }
        let start = block_id * BLOCK_SIZE;
        self.inner.lock().unwrap()[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> mfs::Result<()> {
        Ok(())
    }
}

/// A freshly created and opened filesystem on a RAM disk.
pub fn fresh_fs() -> (RamDisk, FileSystem) {
    let disk = RamDisk::new(NUM_BLOCKS);
    FileSystem::create(Arc::new(disk.clone())).unwrap();
    let fs = FileSystem::open(Arc::new(disk.clone())).unwrap();
    (disk, fs)
}

/// Scratch directory under the system temp dir, removed on drop.
pub struct TestDir(PathBuf);

impl TestDir {
    pub fn new(label: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("mfs-{}-{}", label, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        TestDir(dir)
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }

    /// Write `data` to a host file called `name`.
    pub fn file(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, data).unwrap();
        path
    }

    pub fn read(&self, name: &str) -> Vec<u8> {
        fs::read(self.path(name)).unwrap()
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen::<u8>()).collect()
}

pub fn read_back(fs: &FileSystem, dir: &TestDir, name: &str) -> Vec<u8> {
    let out = dir.path(&format!("{}.out", name));
    fs.retrieve(name, Some(&out)).unwrap();
    std::fs::read(out).unwrap()
}

pub fn assert_file_eq(path: &Path, expected: &[u8]) {
    let actual = fs::read(path).unwrap();
    assert_eq!(actual.len(), expected.len(), "length of {}", path.display());
    assert!(actual == expected, "contents of {} differ", path.display());
}
