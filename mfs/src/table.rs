//! Directory and inode tables.
//!
//! A slot holding `None` is free. That is the only record of validity: the
//! free-inode bitmap written to disk is derived from the inode slots.

use bitflags::bitflags;

use crate::bitmap::Bitmap;
use crate::config::{BLOCK_SIZE, NUM_FILES};

bitflags! {
    pub struct InodeFlags: u8 {
        const HIDDEN = 1 << 0;
        const READ_ONLY = 1 << 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inode: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub size: u64,
    /// Data block ids in file order.
    pub blocks: Vec<u32>,
    pub flags: InodeFlags,
    /// Unix seconds.
    pub created_at: i64,
}

impl Inode {
    pub fn is_hidden(&self) -> bool {
        self.flags.contains(InodeFlags::HIDDEN)
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.contains(InodeFlags::READ_ONLY)
    }
}

/// Blocks needed to hold `size` bytes.
pub fn blocks_for(size: u64) -> usize {
    ((size + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64) as usize
}

pub struct DirectoryTable {
    slots: Vec<Option<DirEntry>>,
}

impl DirectoryTable {
    pub fn new() -> Self {
        Self {
            slots: vec![None; NUM_FILES],
        }
    }

    pub(crate) fn from_slots(slots: Vec<Option<DirEntry>>) -> Self {
        debug_assert_eq!(slots.len(), NUM_FILES);
        Self { slots }
    }

    pub fn slots(&self) -> &[Option<DirEntry>] {
        &self.slots
    }

    pub fn get(&self, slot: usize) -> Option<&DirEntry> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Slot of the valid entry called `name`.
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(entry) if entry.name == name))
    }

    pub fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn alloc(&mut self, entry: DirEntry) -> Option<usize> {
        let slot = self.first_free()?;
        self.slots[slot] = Some(entry);
        Some(slot)
    }

    pub fn free(&mut self, slot: usize) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = None;
        }
    }

    /// Valid entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &DirEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|entry| (slot, entry)))
    }
}

impl Default for DirectoryTable {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InodeTable {
    slots: Vec<Option<Inode>>,
}

impl InodeTable {
    pub fn new() -> Self {
        Self {
            slots: vec![None; NUM_FILES],
        }
    }

    pub(crate) fn from_slots(slots: Vec<Option<Inode>>) -> Self {
        debug_assert_eq!(slots.len(), NUM_FILES);
        Self { slots }
    }

    pub fn slots(&self) -> &[Option<Inode>] {
        &self.slots
    }

    pub fn get(&self, slot: usize) -> Option<&Inode> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Inode> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn alloc(&mut self, inode: Inode) -> Option<usize> {
        let slot = self.first_free()?;
        self.slots[slot] = Some(inode);
        Some(slot)
    }

    /// Release `slot`, handing back the inode it held.
    pub fn free(&mut self, slot: usize) -> Option<Inode> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Free-inode bitmap view of the table.
    pub fn bitmap(&self) -> Bitmap {
        let mut bitmap = Bitmap::new(self.slots.len());
        for (slot, inode) in self.slots.iter().enumerate() {
            if inode.is_some() {
                bitmap.set(slot);
            }
        }
        bitmap
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
