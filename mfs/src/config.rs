pub const BLOCK_SIZE: usize = 8192;
pub const NUM_BLOCKS: usize = 4226;
pub const NUM_FILES: usize = 128;
pub const MAX_NAME_LEN: usize = 32;

pub const MAX_FILE_SIZE: usize = 10_240_000;
pub const MAX_BLOCKS_PER_FILE: usize = (MAX_FILE_SIZE + BLOCK_SIZE - 1) / BLOCK_SIZE;

pub const IMAGE_SIZE: usize = NUM_BLOCKS * BLOCK_SIZE;

// reserved region, see layout.rs for the encoding of each block
pub const DIRECTORY_BLOCK: usize = 0;
pub const LINK_TABLE_BLOCK: usize = 1;
pub const INODE_BITMAP_BLOCK: usize = 7;
pub const BLOCK_BITMAP_BLOCK: usize = 10;
pub const INODE_TABLE_BLOCK: usize = 13;
pub const RESERVED_BLOCKS: usize = 14;

pub const DATA_BLOCKS: usize = NUM_BLOCKS - RESERVED_BLOCKS;
