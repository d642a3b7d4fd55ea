//! A single-image filesystem.
//!
//! An image is `NUM_BLOCKS` blocks of `BLOCK_SIZE` bytes. The first
//! `RESERVED_BLOCKS` hold the directory, the block link table, both bitmaps and
//! the inode table; the rest hold file data. A session loads the whole image
//! into memory, works on it, and writes it back on close.

mod arena;
mod bitmap;
mod block_dev;
mod config;
mod error;
mod fs;
mod image;
mod layout;
mod name;
mod ops;
mod session;
mod table;
mod time;

pub use arena::{BlockArena, DataBlock};
pub use bitmap::Bitmap;
pub use block_dev::BlockDevice;
pub use config::*;
pub use error::{FsError, NameError, Result};
pub use fs::FileSystem;
pub use image::BlockFile;
pub use layout::CHAIN_END;
pub use name::validate_name;
pub use ops::{Attribute, FileInfo};
pub use session::Session;
pub use table::{blocks_for, DirEntry, Inode, InodeFlags};
pub use time::format_timestamp;
