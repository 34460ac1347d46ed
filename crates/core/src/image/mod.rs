//! Filesystem container seam.
//!
//! Parsing a container (superblock, inode and directory tables, compressed
//! data blocks) is delegated to an [`ImageCodec`]. The materializer only sees
//! the narrow view defined here: a superblock summary and a lazy sequence of
//! [`ImageEntry`] values.
//!
//! Two implementations ship with the crate:
//! - [`MemoryImage`]: an in-memory tree, useful for tests and for callers that
//!   already hold decoded entries.
//! - `BackhandCodec` (feature `squashfs-backend`): SquashFS via `backhand`.

mod memory;
#[cfg(feature = "squashfs-backend")]
mod squashfs;
mod superblock;

#[cfg(feature = "squashfs-backend")]
pub use squashfs::BackhandCodec;
pub use memory::{MemoryCodec, MemoryImage, MemoryNode};
pub use superblock::{CompressionKind, SuperblockInfo, SQUASHFS_MAGIC};

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Node types that carry no portable content and are never materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialKind {
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    Unknown,
}

impl fmt::Display for SpecialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpecialKind::CharDevice => "character device",
            SpecialKind::BlockDevice => "block device",
            SpecialKind::Fifo => "fifo",
            SpecialKind::Socket => "socket",
            SpecialKind::Unknown => "unknown node",
        })
    }
}

/// Entry payload, by node type.
pub enum EntryKind<'a> {
    Directory,
    /// Regular file; content is streamed from the reader on demand.
    File(Box<dyn Read + 'a>),
    /// Symbolic link and its target, verbatim.
    Symlink(String),
    Other(SpecialKind),
}

impl EntryKind<'_> {
    pub fn label(&self) -> EntryLabel {
        match self {
            EntryKind::Directory => EntryLabel::Directory,
            EntryKind::File(_) => EntryLabel::File,
            EntryKind::Symlink(_) => EntryLabel::Symlink,
            EntryKind::Other(kind) => EntryLabel::Other(*kind),
        }
    }
}

impl fmt::Debug for EntryKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Directory => f.write_str("Directory"),
            EntryKind::File(_) => f.write_str("File(..)"),
            EntryKind::Symlink(target) => f.debug_tuple("Symlink").field(target).finish(),
            EntryKind::Other(kind) => f.debug_tuple("Other").field(kind).finish(),
        }
    }
}

/// Payload-free copy of an [`EntryKind`], for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryLabel {
    Directory,
    File,
    Symlink,
    Other(SpecialKind),
}

impl fmt::Display for EntryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryLabel::Directory => f.write_str("directory"),
            EntryLabel::File => f.write_str("file"),
            EntryLabel::Symlink => f.write_str("symlink"),
            EntryLabel::Other(kind) => kind.fmt(f),
        }
    }
}

/// One node of a container's tree.
#[derive(Debug)]
pub struct ImageEntry<'a> {
    /// Slash-separated path, normally rooted (`/etc/passwd`).
    pub path: String,
    pub kind: EntryKind<'a>,
}

impl<'a> ImageEntry<'a> {
    pub fn new(path: impl Into<String>, kind: EntryKind<'a>) -> Self {
        Self { path: path.into(), kind }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to read container {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes are not a container this codec understands.
    #[error("malformed container {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
}

impl CodecError {
    pub fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        CodecError::Malformed { path: path.to_path_buf(), reason: reason.into() }
    }
}

/// An opened container.
pub trait FilesystemImage {
    fn superblock(&self) -> &SuperblockInfo;

    /// Entries in the codec's iteration order. Parents are not guaranteed to
    /// precede their children.
    fn entries(&self) -> Box<dyn Iterator<Item = ImageEntry<'_>> + '_>;
}

/// Opens stored containers.
pub trait ImageCodec {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    fn open(&self, path: &Path) -> Result<Box<dyn FilesystemImage>, CodecError>;
}
