use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{
    CodecError, CompressionKind, EntryKind, FilesystemImage, ImageCodec, ImageEntry, SpecialKind,
    SuperblockInfo, SQUASHFS_MAGIC,
};

/// Node stored in a [`MemoryImage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryNode {
    Directory,
    File(Vec<u8>),
    Symlink(String),
    Special(SpecialKind),
}

/// Container tree held entirely in memory, iterated in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    superblock: SuperblockInfo,
    entries: Vec<(String, MemoryNode)>,
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryImage {
    pub fn new() -> Self {
        Self {
            superblock: SuperblockInfo {
                magic: SQUASHFS_MAGIC,
                compression: CompressionKind::None,
                block_size: 131_072,
                bytes_used: 0,
                inode_count: 0,
                fragment_count: 0,
                inode_table_offset: 0,
                directory_table_offset: 0,
                fragment_table_offset: 0,
                id_table_offset: 0,
                xattr_table_offset: u64::MAX,
            },
            entries: Vec::new(),
        }
    }

    pub fn with_superblock(mut self, superblock: SuperblockInfo) -> Self {
        self.superblock = superblock;
        self
    }

    pub fn push(&mut self, path: impl Into<String>, node: MemoryNode) -> &mut Self {
        self.entries.push((path.into(), node));
        self.superblock.inode_count = self.entries.len() as u32;
        self
    }

    pub fn dir(mut self, path: impl Into<String>) -> Self {
        self.push(path, MemoryNode::Directory);
        self
    }

    pub fn file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.push(path, MemoryNode::File(content.into()));
        self
    }

    pub fn symlink(mut self, path: impl Into<String>, target: impl Into<String>) -> Self {
        self.push(path, MemoryNode::Symlink(target.into()));
        self
    }

    pub fn special(mut self, path: impl Into<String>, kind: SpecialKind) -> Self {
        self.push(path, MemoryNode::Special(kind));
        self
    }

    pub fn nodes(&self) -> &[(String, MemoryNode)] {
        &self.entries
    }
}

impl FilesystemImage for MemoryImage {
    fn superblock(&self) -> &SuperblockInfo {
        &self.superblock
    }

    fn entries(&self) -> Box<dyn Iterator<Item = ImageEntry<'_>> + '_> {
        Box::new(self.entries.iter().map(|(path, node)| {
            let kind = match node {
                MemoryNode::Directory => EntryKind::Directory,
                MemoryNode::File(bytes) => EntryKind::File(Box::new(bytes.as_slice())),
                MemoryNode::Symlink(target) => EntryKind::Symlink(target.clone()),
                MemoryNode::Special(kind) => EntryKind::Other(*kind),
            };
            ImageEntry::new(path.clone(), kind)
        }))
    }
}

/// Codec that serves a fixed [`MemoryImage`] for any stored container that
/// starts with the SquashFS magic.
///
/// Checks the magic only; nothing else in the file is parsed. Useful until a
/// real container parser is linked in, and for exercising the pipeline.
#[derive(Debug, Clone)]
pub struct MemoryCodec {
    image: MemoryImage,
}

impl MemoryCodec {
    pub fn new(image: MemoryImage) -> Self {
        Self { image }
    }
}

impl ImageCodec for MemoryCodec {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FilesystemImage>, CodecError> {
        let mut magic = [0u8; 4];
        File::open(path)
            .and_then(|mut f| f.read_exact(&mut magic))
            .map_err(|source| CodecError::Io { path: path.to_path_buf(), source })?;

        let found = u32::from_le_bytes(magic);
        if found != SQUASHFS_MAGIC {
            return Err(CodecError::malformed(path, format!("bad magic 0x{found:08X}")));
        }

        let mut image = self.image.clone();
        image.superblock.bytes_used = std::fs::metadata(path)
            .map(|m| m.len())
            .map_err(|source| CodecError::Io { path: path.to_path_buf(), source })?;
        Ok(Box::new(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_stream_file_content_in_order() {
        let image = MemoryImage::new().file("/a.txt", "hello").dir("/d").symlink("/l", "a.txt");
        let mut seen = Vec::new();
        for entry in image.entries() {
            let label = entry.kind.label();
            if let EntryKind::File(mut reader) = entry.kind {
                let mut buf = String::new();
                reader.read_to_string(&mut buf).unwrap();
                assert_eq!(buf, "hello");
            }
            seen.push((entry.path, label));
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0, "/a.txt");
        assert_eq!(image.superblock().inode_count, 3);
    }

    #[test]
    fn codec_rejects_wrong_magic() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.bin");
        std::fs::write(&bogus, b"nope, not a container").unwrap();

        let codec = MemoryCodec::new(MemoryImage::new());
        match codec.open(&bogus) {
            Err(CodecError::Malformed { reason, .. }) => assert!(reason.contains("bad magic")),
            Err(other) => panic!("expected Malformed, got {other}"),
            Ok(_) => panic!("expected Malformed, got Ok(_)"),
        }
    }

    #[test]
    fn codec_reports_missing_file_as_io() {
        let dir = tempfile::tempdir().unwrap();
        let codec = MemoryCodec::new(MemoryImage::new());
        assert!(matches!(codec.open(&dir.path().join("missing")), Err(CodecError::Io { .. })));
    }
}
