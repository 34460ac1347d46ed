use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use backhand::{FilesystemReader, InnerNode, Squashfs};

use super::{
    CodecError, CompressionKind, EntryKind, FilesystemImage, ImageCodec, ImageEntry, SpecialKind,
    SuperblockInfo,
};

/// SquashFS (v4) codec backed by `backhand`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackhandCodec;

struct BackhandImage {
    superblock: SuperblockInfo,
    reader: FilesystemReader<'static>,
}

impl ImageCodec for BackhandCodec {
    fn name(&self) -> &'static str {
        "backhand"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FilesystemImage>, CodecError> {
        let file = File::open(path)
            .map_err(|source| CodecError::Io { path: path.to_path_buf(), source })?;
        let squashfs = Squashfs::from_reader(BufReader::new(file))
            .map_err(|e| CodecError::malformed(path, e.to_string()))?;
        let sb = &squashfs.superblock;
        let superblock = SuperblockInfo {
            magic: u32::from_le_bytes(sb.magic),
            compression: CompressionKind::from_id(sb.compressor as u16),
            block_size: sb.block_size,
            bytes_used: sb.bytes_used,
            inode_count: sb.inode_count,
            fragment_count: sb.frag_count,
            inode_table_offset: sb.inode_table,
            directory_table_offset: sb.dir_table,
            fragment_table_offset: sb.frag_table,
            id_table_offset: sb.id_table,
            xattr_table_offset: sb.xattr_table,
        };
        let reader = squashfs
            .into_filesystem_reader()
            .map_err(|e| CodecError::malformed(path, e.to_string()))?;
        Ok(Box::new(BackhandImage { superblock, reader }))
    }
}

impl FilesystemImage for BackhandImage {
    fn superblock(&self) -> &SuperblockInfo {
        &self.superblock
    }

    fn entries(&self) -> Box<dyn Iterator<Item = ImageEntry<'_>> + '_> {
        Box::new(self.reader.files().map(move |node| {
            let kind = match &node.inner {
                InnerNode::File(file) => {
                    EntryKind::File(Box::new(self.reader.file(file).reader()))
                }
                InnerNode::Symlink(link) => {
                    EntryKind::Symlink(link.link.to_string_lossy().into_owned())
                }
                InnerNode::Dir(_) => EntryKind::Directory,
                InnerNode::CharacterDevice(_) => EntryKind::Other(SpecialKind::CharDevice),
                InnerNode::BlockDevice(_) => EntryKind::Other(SpecialKind::BlockDevice),
                // Named pipes, sockets and anything newer than this adapter.
                #[allow(unreachable_patterns)]
                _ => EntryKind::Other(SpecialKind::Unknown),
            };
            ImageEntry::new(node.fullpath.to_string_lossy().into_owned(), kind)
        }))
    }
}
