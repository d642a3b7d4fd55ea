use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::{MAX_FILE_SIZE, MAX_NAME_LEN};

#[derive(Error, Debug)]
pub enum FsError {
    #[error("File does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("File size is too big ({size} bytes, limit {limit})", limit = MAX_FILE_SIZE)]
    FileTooLarge { size: u64 },
    #[error("Not enough disk space ({needed} bytes needed, {free} bytes free)")]
    InsufficientSpace { needed: u64, free: u64 },
    #[error("File already put in the file system: {0}")]
    DuplicateName(String),
    #[error("Directory is full")]
    DirectoryFull,
    #[error("{reason}: {name}")]
    NameInvalid { name: String, reason: NameError },
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("That file is marked read-only: {0}")]
    ReadOnlyViolation(String),
    #[error("Input is incorrect: {0} (expected +h, -h, +r or -r)")]
    InvalidFlag(String),
    #[error("Could not open output file {}: {source}", .path.display())]
    DestinationUnwritable { path: PathBuf, source: io::Error },
    #[error("Image not found {}: {source}", .path.display())]
    ImageNotFound { path: PathBuf, source: io::Error },
    #[error("No file system image is open")]
    NoImageOpen,
    #[error("Corrupt image: {0}")]
    CorruptImage(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameError {
    #[error("File name is empty")]
    Empty,
    #[error("File name too long (limit {limit})", limit = MAX_NAME_LEN)]
    TooLong,
    #[error("File name is not valid ('{0}' not allowed)")]
    IllegalChar(char),
}

pub type Result<T> = core::result::Result<T, FsError>;
