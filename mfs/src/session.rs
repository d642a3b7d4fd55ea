//! The single open image of a process.
//!
//! At most one image is open at a time. Creating or opening an image drops
//! the current one without writing it back; only `close_image` persists.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::warn;

use crate::config::NUM_BLOCKS;
use crate::error::{FsError, Result};
use crate::fs::FileSystem;
use crate::image::BlockFile;
use crate::ops::{Attribute, FileInfo};

#[derive(Default)]
pub struct Session {
    current: Option<(PathBuf, FileSystem)>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Backing file of the open image.
    pub fn image_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|(path, _)| path.as_path())
    }

    /// Write a zero-filled image to `path`. Any open image is discarded and
    /// none is open afterwards.
    pub fn create_image(&mut self, path: &Path) -> Result<()> {
        let file = BlockFile::create(path, NUM_BLOCKS)?;
        FileSystem::create(Arc::new(file))?;
        self.discard();
        Ok(())
    }

    /// Load the image at `path`, replacing any open image.
    pub fn open_image(&mut self, path: &Path) -> Result<()> {
        let file = BlockFile::open(path)?;
        let fs = FileSystem::open(Arc::new(file))?;
        self.discard();
        self.current = Some((path.to_path_buf(), fs));
        Ok(())
    }

    /// Write the open image back to its file and end the session.
    pub fn close_image(&mut self) -> Result<()> {
        let (_, fs) = self.current.take().ok_or(FsError::NoImageOpen)?;
        fs.close()
    }

    pub fn fs(&self) -> Result<&FileSystem> {
        self.current.as_ref().map(|(_, fs)| fs).ok_or(FsError::NoImageOpen)
    }

    pub fn fs_mut(&mut self) -> Result<&mut FileSystem> {
        self.current.as_mut().map(|(_, fs)| fs).ok_or(FsError::NoImageOpen)
    }

    pub fn store(&mut self, path: &Path) -> Result<FileInfo> {
        self.fs_mut()?.store(path)
    }

    pub fn retrieve(&self, name: &str, dest: Option<&Path>) -> Result<u64> {
        self.fs()?.retrieve(name, dest)
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.fs_mut()?.delete(name)
    }

    /// Apply an attribute token (`+h`, `-h`, `+r`, `-r`) to `name`.
    /// A missing file is reported before a bad token.
    pub fn attribute(&mut self, flag: &str, name: &str) -> Result<()> {
        let fs = self.fs_mut()?;
        if !fs.contains(name) {
            return Err(FsError::NotFound(name.to_string()));
        }
        let attr: Attribute = flag.parse()?;
        fs.attribute(name, attr)
    }

    pub fn list(&self) -> Result<Vec<FileInfo>> {
        Ok(self.fs()?.list())
    }

    pub fn free_space(&self) -> Result<u64> {
        Ok(self.fs()?.free_space())
    }

    fn discard(&mut self) {
        if let Some((path, _)) = self.current.take() {
            warn!("discarding unsaved session on {}", path.display());
        }
    }
}
