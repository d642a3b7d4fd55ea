//! Encoding of the reserved blocks `[0, 14)`.
//!
//! - block 0: directory, `NUM_FILES` entries of `DIR_ENTRY_SIZE` bytes
//! - blocks 1..4: link table, one `u32` per block naming the next block of its chain
//! - block 7: free-inode bitmap
//! - block 10: free-block bitmap
//! - block 13: inode table, `NUM_FILES` records of `DISK_INODE_SIZE` bytes
//!
//! Everything else in the reserved region is zero padding. Integers are little-endian.

use crate::arena::BlockArena;
use crate::bitmap::Bitmap;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::table::{DirEntry, DirectoryTable, Inode, InodeFlags, InodeTable};

pub const DIR_ENTRY_SIZE: usize = 40;
pub const DISK_INODE_SIZE: usize = 32;
const LINK_SIZE: usize = core::mem::size_of::<u32>();

/// Terminates a chain in the link table; also the first block of an empty file.
pub const CHAIN_END: u32 = u32::MAX;

const _: () = assert!(NUM_FILES * DIR_ENTRY_SIZE <= BLOCK_SIZE);
const _: () = assert!(NUM_FILES * DISK_INODE_SIZE <= BLOCK_SIZE);
const _: () = assert!(
    LINK_TABLE_BLOCK * BLOCK_SIZE + NUM_BLOCKS * LINK_SIZE <= INODE_BITMAP_BLOCK * BLOCK_SIZE
);
const _: () = assert!(NUM_BLOCKS <= BLOCK_SIZE * 8);

/// Decoded contents of the reserved region.
pub struct Metadata {
    pub directory: DirectoryTable,
    pub inodes: InodeTable,
    pub block_bitmap: Bitmap,
}

impl Metadata {
    /// An empty filesystem: only the reserved blocks are in use.
    #[cfg(test)]
    pub fn empty() -> Self {
        Self {
            directory: DirectoryTable::new(),
            inodes: InodeTable::new(),
            block_bitmap: reserved_block_bitmap(Bitmap::new(NUM_BLOCKS)),
        }
    }
}

fn reserved_block_bitmap(mut bitmap: Bitmap) -> Bitmap {
    for block_id in 0..RESERVED_BLOCKS {
        bitmap.set(block_id);
    }
    bitmap
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn read_i64(buf: &[u8], offset: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[offset..offset + 8]);
    i64::from_le_bytes(raw)
}

/// `{valid: u32, name: [u8; 32], inode: i32}`, name NUL-padded, inode -1 when free.
struct DiskDirEntry;

impl DiskDirEntry {
    fn encode(entry: Option<&DirEntry>, buf: &mut [u8]) {
        buf[..DIR_ENTRY_SIZE].fill(0);
        match entry {
            Some(entry) => {
                buf[0..4].copy_from_slice(&1u32.to_le_bytes());
                buf[4..4 + entry.name.len()].copy_from_slice(entry.name.as_bytes());
                buf[36..40].copy_from_slice(&(entry.inode as i32).to_le_bytes());
            }
            None => buf[36..40].copy_from_slice(&(-1i32).to_le_bytes()),
        }
    }

    fn decode(slot: usize, buf: &[u8]) -> Result<Option<DirEntry>> {
        if read_u32(buf, 0) == 0 {
            return Ok(None);
        }
        let raw_name = &buf[4..4 + MAX_NAME_LEN];
        let len = raw_name.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_LEN);
        let name = core::str::from_utf8(&raw_name[..len])
            .map_err(|_| FsError::CorruptImage(format!("directory slot {} name is not utf-8", slot)))?;
        let inode = read_u32(buf, 36) as i32;
        if inode < 0 || inode as usize >= NUM_FILES {
            return Err(FsError::CorruptImage(format!(
                "directory slot {} references inode {}",
                slot, inode
            )));
        }
        Ok(Some(DirEntry {
            name: name.to_string(),
            inode: inode as usize,
        }))
    }
}

/// `{flags: u8, _: [u8; 3], size: u32, created_at: i64, first_block: u32, block_count: u32, _: [u8; 8]}`
struct DiskInode {
    flags: u8,
    size: u32,
    created_at: i64,
    first_block: u32,
    block_count: u32,
}

impl DiskInode {
    fn from_inode(inode: &Inode) -> Self {
        Self {
            flags: inode.flags.bits(),
            size: inode.size as u32,
            created_at: inode.created_at,
            first_block: inode.blocks.first().copied().unwrap_or(CHAIN_END),
            block_count: inode.blocks.len() as u32,
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[..DISK_INODE_SIZE].fill(0);
        buf[0] = self.flags;
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());
        buf[8..16].copy_from_slice(&self.created_at.to_le_bytes());
        buf[16..20].copy_from_slice(&self.first_block.to_le_bytes());
        buf[20..24].copy_from_slice(&self.block_count.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            flags: buf[0],
            size: read_u32(buf, 4),
            created_at: read_i64(buf, 8),
            first_block: read_u32(buf, 16),
            block_count: read_u32(buf, 20),
        }
    }

    /// Follow the link table to rebuild the block chain.
    fn into_inode(self, slot: usize, links: &[u32]) -> Result<Inode> {
        let corrupt = |what: String| FsError::CorruptImage(format!("inode {}: {}", slot, what));
        let flags = InodeFlags::from_bits(self.flags)
            .ok_or_else(|| corrupt(format!("unknown flags {:#x}", self.flags)))?;
        if self.block_count as usize > MAX_BLOCKS_PER_FILE {
            return Err(corrupt(format!("chain of {} blocks", self.block_count)));
        }
        let mut blocks = Vec::with_capacity(self.block_count as usize);
        let mut next = self.first_block;
        for _ in 0..self.block_count {
            if next as usize >= NUM_BLOCKS {
                return Err(corrupt(format!("chain reaches block {}", next)));
            }
            blocks.push(next);
            next = links[next as usize];
        }
        if next != CHAIN_END {
            return Err(corrupt(format!("chain does not end after {} blocks", self.block_count)));
        }
        Ok(Inode {
            size: self.size as u64,
            blocks,
            flags,
            created_at: self.created_at,
        })
    }
}

/// Rebuild the tables from the reserved blocks of `arena`.
pub fn decode(arena: &BlockArena) -> Result<Metadata> {
    let dir_bytes = &arena.block(DIRECTORY_BLOCK).0;
    let directory = (0..NUM_FILES)
        .map(|slot| DiskDirEntry::decode(slot, &dir_bytes[slot * DIR_ENTRY_SIZE..]))
        .collect::<Result<Vec<_>>>()?;

    let inode_bitmap = Bitmap::decode(NUM_FILES, &arena.block(INODE_BITMAP_BLOCK).0)?;
    let block_bitmap = reserved_block_bitmap(Bitmap::decode(
        NUM_BLOCKS,
        &arena.block(BLOCK_BITMAP_BLOCK).0,
    )?);

    let links: Vec<u32> = arena
        .read_region(LINK_TABLE_BLOCK, NUM_BLOCKS * LINK_SIZE)
        .chunks_exact(LINK_SIZE)
        .map(|chunk| read_u32(chunk, 0))
        .collect();

    let inode_bytes = &arena.block(INODE_TABLE_BLOCK).0;
    let inodes = (0..NUM_FILES)
        .map(|slot| {
            if !inode_bitmap.is_set(slot) {
                return Ok(None);
            }
            DiskInode::decode(&inode_bytes[slot * DISK_INODE_SIZE..])
                .into_inode(slot, &links)
                .map(Some)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Metadata {
        directory: DirectoryTable::from_slots(directory),
        inodes: InodeTable::from_slots(inodes),
        block_bitmap,
    })
}

/// Write the tables into the reserved blocks of `arena`.
pub fn encode(meta: &Metadata, arena: &mut BlockArena) {
    let mut dir_bytes = vec![0u8; NUM_FILES * DIR_ENTRY_SIZE];
    for (slot, entry) in meta.directory.slots().iter().enumerate() {
        DiskDirEntry::encode(entry.as_ref(), &mut dir_bytes[slot * DIR_ENTRY_SIZE..]);
    }
    arena.write_region(DIRECTORY_BLOCK, &dir_bytes);

    let mut links = vec![CHAIN_END; NUM_BLOCKS];
    let mut inode_bytes = vec![0u8; NUM_FILES * DISK_INODE_SIZE];
    for (slot, inode) in meta.inodes.slots().iter().enumerate() {
        if let Some(inode) = inode {
            for pair in inode.blocks.windows(2) {
                links[pair[0] as usize] = pair[1];
            }
            DiskInode::from_inode(inode).encode(&mut inode_bytes[slot * DISK_INODE_SIZE..]);
        }
    }
    let link_bytes: Vec<u8> = links.iter().flat_map(|link| link.to_le_bytes()).collect();
    arena.write_region(LINK_TABLE_BLOCK, &link_bytes);
    arena.write_region(INODE_TABLE_BLOCK, &inode_bytes);

    let inode_bitmap = meta.inodes.bitmap();
    let mut bitmap_bytes = vec![0u8; inode_bitmap.encoded_len()];
    inode_bitmap.encode(&mut bitmap_bytes);
    arena.write_region(INODE_BITMAP_BLOCK, &bitmap_bytes);

    let mut bitmap_bytes = vec![0u8; meta.block_bitmap.encoded_len()];
    meta.block_bitmap.encode(&mut bitmap_bytes);
    arena.write_region(BLOCK_BITMAP_BLOCK, &bitmap_bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_inode(blocks: Vec<u32>, size: u64) -> Inode {
        Inode {
            size,
            blocks,
            flags: InodeFlags::READ_ONLY,
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn zeroed_arena_is_empty_fs() {
        let arena = BlockArena::new();
        let meta = decode(&arena).unwrap();
        assert_eq!(meta.directory.iter().count(), 0);
        assert!(meta.inodes.slots().iter().all(Option::is_none));
        assert_eq!(meta.block_bitmap.count_free(), DATA_BLOCKS);
        assert_eq!(meta.block_bitmap.first_free(), Some(RESERVED_BLOCKS));
    }

    #[test]
    fn tables_survive_encode_decode() {
        let mut meta = Metadata::empty();
        let chain = vec![20, 14, 300];
        for &b in &chain {
            meta.block_bitmap.set(b as usize);
        }
        let inode_slot = meta.inodes.alloc(sample_inode(chain.clone(), 2 * BLOCK_SIZE as u64 + 5)).unwrap();
        meta.inodes.alloc(sample_inode(Vec::new(), 0)).unwrap();
        meta.directory.alloc(DirEntry { name: "a.txt".into(), inode: inode_slot });
        meta.directory.alloc(DirEntry { name: "empty".into(), inode: 1 });

        let mut arena = BlockArena::new();
        encode(&meta, &mut arena);
        let decoded = decode(&arena).unwrap();

        assert_eq!(decoded.directory.slots(), meta.directory.slots());
        assert_eq!(decoded.inodes.slots(), meta.inodes.slots());
        assert_eq!(decoded.block_bitmap, meta.block_bitmap);
        assert_eq!(decoded.inodes.get(inode_slot).unwrap().blocks, chain);
    }

    #[test]
    fn free_directory_slot_stores_no_inode() {
        let mut buf = [0xffu8; DIR_ENTRY_SIZE];
        DiskDirEntry::encode(None, &mut buf);
        assert_eq!(read_u32(&buf, 0), 0);
        assert_eq!(read_u32(&buf, 36) as i32, -1);
    }

    #[test]
    fn decode_rejects_runaway_chain() {
        let mut meta = Metadata::empty();
        meta.inodes.alloc(sample_inode(vec![14, 15], 10_000)).unwrap();
        let mut arena = BlockArena::new();
        encode(&meta, &mut arena);
        // make block 15 point back at 14
        let link_offset = 15 * LINK_SIZE;
        arena.block_mut(LINK_TABLE_BLOCK).0[link_offset..link_offset + 4]
            .copy_from_slice(&14u32.to_le_bytes());
        assert!(matches!(decode(&arena), Err(FsError::CorruptImage(_))));
    }

    #[test]
    fn decode_rejects_bad_inode_reference() {
        let mut arena = BlockArena::new();
        let block = &mut arena.block_mut(DIRECTORY_BLOCK).0;
        block[0..4].copy_from_slice(&1u32.to_le_bytes());
        block[4..5].copy_from_slice(b"x");
        block[36..40].copy_from_slice(&(NUM_FILES as i32).to_le_bytes());
        assert!(matches!(decode(&arena), Err(FsError::CorruptImage(_))));
    }
}
