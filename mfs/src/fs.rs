use std::sync::Arc;

use log::{debug, info, warn};

use crate::arena::{BlockArena, DataBlock};
use crate::block_dev::BlockDevice;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::layout::{self, Metadata};
use crate::name::validate_name;
use crate::table::blocks_for;

/// reserved blocks [0, 14): directory, link table, inode bitmap, block bitmap, inode table
/// data blocks [14, NUM_BLOCKS)
pub struct FileSystem {
    pub(crate) device: Arc<dyn BlockDevice>,
    pub(crate) arena: BlockArena,
    pub(crate) meta: Metadata,
}

impl FileSystem {
    /// Zero-fill every block of `device`, leaving an empty filesystem on it.
    pub fn create(device: Arc<dyn BlockDevice>) -> Result<()> {
        let zero = DataBlock([0u8; BLOCK_SIZE]);
        for block_id in 0..NUM_BLOCKS {
            device.write_block(block_id, &zero.0)?;
        }
        device.flush()?;
        info!("created image: {} blocks of {} bytes", NUM_BLOCKS, BLOCK_SIZE);
        Ok(())
    }

    /// Load the whole image from `device` and decode its tables.
    pub fn open(device: Arc<dyn BlockDevice>) -> Result<Self> {
        let arena = BlockArena::load(&*device)?;
        let meta = layout::decode(&arena)?;
        let fs = Self {
            device,
            arena,
            meta,
        };
        fs.check()?;
        info!(
            "opened image: {} files, {} bytes free",
            fs.meta.directory.iter().count(),
            fs.free_space()
        );
        Ok(fs)
    }

    /// Encode the tables and write the whole arena back to the device.
    pub fn close(mut self) -> Result<()> {
        layout::encode(&self.meta, &mut self.arena);
        self.arena.sync(&*self.device)?;
        info!("closed image");
        Ok(())
    }

    /// Bytes available for file data.
    pub fn free_space(&self) -> u64 {
        (self.meta.block_bitmap.count_free() * BLOCK_SIZE) as u64
    }

    pub fn alloc_data_block(&mut self) -> Option<u32> {
        let block_id = self.meta.block_bitmap.alloc()?;
        debug_assert!(block_id >= RESERVED_BLOCKS);
        Some(block_id as u32)
    }

    /// Release a data block and zero its contents. Releasing a free block does nothing.
    pub fn dealloc_data_block(&mut self, block_id: u32) {
        let block_id = block_id as usize;
        if block_id < RESERVED_BLOCKS || !self.meta.block_bitmap.is_set(block_id) {
            return;
        }
        self.arena.block_mut(block_id).clear();
        self.meta.block_bitmap.dealloc(block_id);
    }

    /// Allocate exactly `count` blocks, or none at all.
    pub(crate) fn alloc_chain(&mut self, count: usize) -> Result<Vec<u32>> {
        let mut chain = Vec::with_capacity(count);
        for _ in 0..count {
            match self.alloc_data_block() {
                Some(block_id) => chain.push(block_id),
                None => {
                    warn!("out of blocks after {} of {}, rolling back", chain.len(), count);
                    self.release_chain(&chain);
                    return Err(FsError::InsufficientSpace {
                        needed: (count * BLOCK_SIZE) as u64,
                        free: self.free_space(),
                    });
                }
            }
        }
        debug!("allocated chain {:?}", chain);
        Ok(chain)
    }

    pub(crate) fn release_chain(&mut self, chain: &[u32]) {
        for &block_id in chain {
            self.dealloc_data_block(block_id);
        }
    }

    /// Verify the structural invariants of the tables.
    pub fn check(&self) -> Result<()> {
        let corrupt = |what: String| -> Result<()> { Err(FsError::CorruptImage(what)) };
        let mut inode_owner = vec![None; NUM_FILES];
        for (slot, entry) in self.meta.directory.iter() {
            if validate_name(&entry.name).is_err() {
                return corrupt(format!("directory slot {} has invalid name {:?}", slot, entry.name));
            }
            if self.meta.directory.lookup(&entry.name) != Some(slot) {
                return corrupt(format!("name {} appears twice", entry.name));
            }
            if self.meta.inodes.get(entry.inode).is_none() {
                return corrupt(format!("{} references free inode {}", entry.name, entry.inode));
            }
            if let Some(other) = inode_owner[entry.inode].replace(slot) {
                return corrupt(format!(
                    "inode {} shared by directory slots {} and {}",
                    entry.inode, other, slot
                ));
            }
        }

        let mut seen = vec![false; NUM_BLOCKS];
        for (slot, inode) in self.meta.inodes.slots().iter().enumerate() {
            let inode = match inode {
                Some(inode) => inode,
                None => continue,
            };
            if inode_owner[slot].is_none() {
                return corrupt(format!("inode {} has no directory entry", slot));
            }
            if inode.size > MAX_FILE_SIZE as u64 {
                return corrupt(format!("inode {} size {} over limit", slot, inode.size));
            }
            if inode.blocks.len() != blocks_for(inode.size) {
                return corrupt(format!(
                    "inode {} holds {} bytes in {} blocks",
                    slot,
                    inode.size,
                    inode.blocks.len()
                ));
            }
            for &block_id in &inode.blocks {
                let block_id = block_id as usize;
                if !(RESERVED_BLOCKS..NUM_BLOCKS).contains(&block_id) {
                    return corrupt(format!("inode {} uses block {}", slot, block_id));
                }
                if !self.meta.block_bitmap.is_set(block_id) {
                    return corrupt(format!("inode {} uses free block {}", slot, block_id));
                }
                if std::mem::replace(&mut seen[block_id], true) {
                    return corrupt(format!("block {} is referenced twice", block_id));
                }
            }
        }
        for block_id in RESERVED_BLOCKS..NUM_BLOCKS {
            if self.meta.block_bitmap.is_set(block_id) && !seen[block_id] {
                return corrupt(format!("block {} is marked used but unreferenced", block_id));
            }
        }
        Ok(())
    }
}
