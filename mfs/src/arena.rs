use crate::block_dev::BlockDevice;
use crate::config::{BLOCK_SIZE, NUM_BLOCKS};
use crate::error::{FsError, Result};

#[derive(Clone)]
#[repr(C)]
pub struct DataBlock(pub [u8; BLOCK_SIZE]);

impl DataBlock {
    pub fn clear(&mut self) {
        self.0.fill(0);
    }
}

/// Every block of an image, held in memory for the lifetime of a session.
pub struct BlockArena {
    blocks: Vec<DataBlock>,
}

impl BlockArena {
    /// A zero-filled arena.
    pub fn new() -> Self {
        Self {
            blocks: vec![DataBlock([0u8; BLOCK_SIZE]); NUM_BLOCKS],
        }
    }

    /// Read the whole image from `device`.
    pub fn load(device: &dyn BlockDevice) -> Result<Self> {
        if device.num_blocks() < NUM_BLOCKS {
            return Err(FsError::CorruptImage(format!(
                "image holds {} blocks, expected {}",
                device.num_blocks(),
                NUM_BLOCKS
            )));
        }
        let mut arena = Self::new();
        for (block_id, block) in arena.blocks.iter_mut().enumerate() {
            device.read_block(block_id, &mut block.0)?;
        }
        Ok(arena)
    }

    /// Write every block back to `device` and flush it.
    pub fn sync(&self, device: &dyn BlockDevice) -> Result<()> {
        for (block_id, block) in self.blocks.iter().enumerate() {
            device.write_block(block_id, &block.0)?;
        }
        device.flush()
    }

    pub fn block(&self, block_id: usize) -> &DataBlock {
        &self.blocks[block_id]
    }

    pub fn block_mut(&mut self, block_id: usize) -> &mut DataBlock {
        &mut self.blocks[block_id]
    }

    /// Copy `len` bytes starting at block `start_block` out of the arena.
    pub fn read_region(&self, start_block: usize, len: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(len);
        let mut block_id = start_block;
        while bytes.len() < len {
            let take = (len - bytes.len()).min(BLOCK_SIZE);
            bytes.extend_from_slice(&self.blocks[block_id].0[..take]);
            block_id += 1;
        }
        bytes
    }

    /// Overwrite the blocks starting at `start_block` with `bytes`, zero-padding the last one.
    pub fn write_region(&mut self, start_block: usize, bytes: &[u8]) {
        for (i, chunk) in bytes.chunks(BLOCK_SIZE).enumerate() {
            let block = &mut self.blocks[start_block + i];
            block.clear();
            block.0[..chunk.len()].copy_from_slice(chunk);
        }
    }
}

impl Default for BlockArena {
    fn default() -> Self {
        Self::new()
    }
}
