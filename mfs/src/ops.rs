//! Operations on stored files.

use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use log::{debug, info, warn};

use crate::config::{BLOCK_SIZE, MAX_FILE_SIZE};
use crate::error::{FsError, NameError, Result};
use crate::fs::FileSystem;
use crate::name::validate_name;
use crate::table::{blocks_for, DirEntry, Inode, InodeFlags};
use crate::time;

/// Everything known about one stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub created_at: i64,
    pub hidden: bool,
    pub read_only: bool,
    pub blocks: Vec<u32>,
}

impl FileInfo {
    fn new(name: &str, inode: &Inode) -> Self {
        Self {
            name: name.to_string(),
            size: inode.size,
            created_at: inode.created_at,
            hidden: inode.is_hidden(),
            read_only: inode.is_read_only(),
            blocks: inode.blocks.clone(),
        }
    }
}

/// One listing line: size, creation time, name.
impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>10} bytes\t{}\t{}",
            self.size,
            time::format_timestamp(self.created_at),
            self.name
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    SetHidden,
    ClearHidden,
    SetReadOnly,
    ClearReadOnly,
}

impl FromStr for Attribute {
    type Err = FsError;

    fn from_str(token: &str) -> Result<Self> {
        match token {
            "+h" => Ok(Self::SetHidden),
            "-h" => Ok(Self::ClearHidden),
            "+r" => Ok(Self::SetReadOnly),
            "-r" => Ok(Self::ClearReadOnly),
            _ => Err(FsError::InvalidFlag(token.to_string())),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SetHidden => "+h",
            Self::ClearHidden => "-h",
            Self::SetReadOnly => "+r",
            Self::ClearReadOnly => "-r",
        })
    }
}

fn source_name(path: &Path) -> Result<&str> {
    let name = path.file_name().and_then(OsStr::to_str).ok_or_else(|| FsError::NameInvalid {
        name: path.display().to_string(),
        reason: NameError::Empty,
    })?;
    validate_name(name)?;
    Ok(name)
}

impl FileSystem {
    /// Copy the host file at `path` into the image under its base name.
    ///
    /// Fails without touching the image if the source is missing, too large,
    /// larger than the free space, or its name is taken.
    pub fn store(&mut self, path: &Path) -> Result<FileInfo> {
        let name = source_name(path)?;
        let source_missing = |_| FsError::SourceNotFound(path.to_path_buf());
        let mut source = File::open(path).map_err(source_missing)?;
        let metadata = source.metadata().map_err(source_missing)?;
        if !metadata.is_file() {
            return Err(FsError::SourceNotFound(path.to_path_buf()));
        }
        self.store_from(name, &mut source, metadata.len())
    }

    /// Store `size` bytes read from `source` as `name`. A read error while
    /// copying releases every block taken so far.
    pub(crate) fn store_from(&mut self, name: &str, source: &mut impl Read, size: u64) -> Result<FileInfo> {
        if size > MAX_FILE_SIZE as u64 {
            return Err(FsError::FileTooLarge { size });
        }
        let free = self.free_space();
        if size > free {
            return Err(FsError::InsufficientSpace { needed: size, free });
        }
        if self.meta.directory.lookup(name).is_some() {
            return Err(FsError::DuplicateName(name.to_string()));
        }
        if self.meta.directory.first_free().is_none() || self.meta.inodes.first_free().is_none() {
            return Err(FsError::DirectoryFull);
        }

        let chain = self.alloc_chain(blocks_for(size))?;
        if let Err(e) = self.copy_in(source, size, &chain) {
            warn!("store {}: {}, releasing {} blocks", name, e, chain.len());
            self.release_chain(&chain);
            return Err(FsError::Io(e));
        }

        let inode = Inode {
            size,
            blocks: chain,
            flags: InodeFlags::empty(),
            created_at: time::now(),
        };
        let info = FileInfo::new(name, &inode);
        let (dir_slot, inode_slot) = self.link(name, inode)?;
        debug!("{} -> directory slot {}, inode {}", name, dir_slot, inode_slot);
        info!("stored {} ({} bytes in {} blocks)", name, size, info.blocks.len());
        Ok(info)
    }

    /// Claim an inode slot and a directory slot for `inode`. If either is
    /// missing, nothing stays claimed and the inode's blocks are released.
    pub(crate) fn link(&mut self, name: &str, inode: Inode) -> Result<(usize, usize)> {
        let inode_slot = match self.meta.inodes.first_free() {
            Some(slot) => slot,
            None => {
                self.release_chain(&inode.blocks);
                return Err(FsError::DirectoryFull);
            }
        };
        let dir_slot = match self.meta.directory.alloc(DirEntry {
            name: name.to_string(),
            inode: inode_slot,
        }) {
            Some(slot) => slot,
            None => {
                self.release_chain(&inode.blocks);
                return Err(FsError::DirectoryFull);
            }
        };
        let claimed = self.meta.inodes.alloc(inode);
        debug_assert_eq!(claimed, Some(inode_slot));
        Ok((dir_slot, inode_slot))
    }

    fn copy_in(&mut self, source: &mut impl Read, size: u64, chain: &[u32]) -> std::io::Result<()> {
        let mut remaining = size as usize;
        for &block_id in chain {
            let len = remaining.min(BLOCK_SIZE);
            let block = &mut self.arena.block_mut(block_id as usize).0;
            source.read_exact(&mut block[..len])?;
            block[len..].fill(0);
            remaining -= len;
        }
        Ok(())
    }

    /// Write the stored file `name` to the host path `dest`, or to `name` when
    /// no destination is given. Returns the number of bytes written.
    pub fn retrieve(&self, name: &str, dest: Option<&Path>) -> Result<u64> {
        let inode = self.inode_of(name)?;
        let dest = dest.unwrap_or_else(|| Path::new(name));
        let mut out = File::create(dest).map_err(|source| FsError::DestinationUnwritable {
            path: dest.to_path_buf(),
            source,
        })?;

        let mut remaining = inode.size as usize;
        for &block_id in &inode.blocks {
            let len = remaining.min(BLOCK_SIZE);
            out.write_all(&self.arena.block(block_id as usize).0[..len])?;
            remaining -= len;
        }
        out.flush()?;
        info!("retrieved {} to {} ({} bytes)", name, dest.display(), inode.size);
        Ok(inode.size)
    }

    /// Remove `name` and release its blocks.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let dir_slot = self
            .meta
            .directory
            .lookup(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let inode_slot = self.entry_inode(dir_slot)?;
        if self.inode_at(inode_slot)?.is_read_only() {
            return Err(FsError::ReadOnlyViolation(name.to_string()));
        }

        if let Some(inode) = self.meta.inodes.free(inode_slot) {
            self.release_chain(&inode.blocks);
        }
        self.meta.directory.free(dir_slot);
        info!("deleted {}", name);
        Ok(())
    }

    /// Toggle a flag on `name`. Size and blocks are untouched.
    pub fn attribute(&mut self, name: &str, attr: Attribute) -> Result<()> {
        let dir_slot = self
            .meta
            .directory
            .lookup(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let inode_slot = self.entry_inode(dir_slot)?;
        let inode = self
            .meta
            .inodes
            .get_mut(inode_slot)
            .ok_or_else(|| FsError::CorruptImage(format!("inode {} is free", inode_slot)))?;
        match attr {
            Attribute::SetHidden => inode.flags.insert(InodeFlags::HIDDEN),
            Attribute::ClearHidden => inode.flags.remove(InodeFlags::HIDDEN),
            Attribute::SetReadOnly => inode.flags.insert(InodeFlags::READ_ONLY),
            Attribute::ClearReadOnly => inode.flags.remove(InodeFlags::READ_ONLY),
        }
        info!("attribute {} {}", attr, name);
        Ok(())
    }

    /// Visible files in directory order.
    pub fn list(&self) -> Vec<FileInfo> {
        self.meta
            .directory
            .iter()
            .filter_map(|(_, entry)| {
                self.meta
                    .inodes
                    .get(entry.inode)
                    .filter(|inode| !inode.is_hidden())
                    .map(|inode| FileInfo::new(&entry.name, inode))
            })
            .collect()
    }

    /// Details of `name`, hidden or not.
    pub fn stat(&self, name: &str) -> Result<FileInfo> {
        Ok(FileInfo::new(name, self.inode_of(name)?))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.meta.directory.lookup(name).is_some()
    }

    fn entry_inode(&self, dir_slot: usize) -> Result<usize> {
        self.meta
            .directory
            .get(dir_slot)
            .map(|entry| entry.inode)
            .ok_or_else(|| FsError::CorruptImage(format!("directory slot {} is free", dir_slot)))
    }

    fn inode_at(&self, inode_slot: usize) -> Result<&Inode> {
        self.meta
            .inodes
            .get(inode_slot)
            .ok_or_else(|| FsError::CorruptImage(format!("inode {} is free", inode_slot)))
    }

    fn inode_of(&self, name: &str) -> Result<&Inode> {
        let dir_slot = self
            .meta
            .directory
            .lookup(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        self.inode_at(self.entry_inode(dir_slot)?)
    }
}
