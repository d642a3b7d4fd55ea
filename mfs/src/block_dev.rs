use crate::error::Result;

/// Backing store of a block arena.
pub trait BlockDevice: Send + Sync {
    /// Number of blocks the device holds.
    fn num_blocks(&self) -> usize;

    /// Read block `block_id` into `buf`, which must be exactly one block long.
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<()>;

    /// Write `buf`, exactly one block long, to block `block_id`.
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<()>;

    /// Persist anything the device buffers.
    fn flush(&self) -> Result<()>;
}
