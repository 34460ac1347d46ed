use std::fmt;

use serde::{Deserialize, Serialize};

/// SquashFS magic (`hsqs`) read as a little-endian u32.
pub const SQUASHFS_MAGIC: u32 = 0x7371_7368;

/// Compressor recorded in a container superblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionKind {
    None,
    Gzip,
    Lzma,
    Lzo,
    Xz,
    Lz4,
    Zstd,
    Unknown(u16),
}

impl CompressionKind {
    /// Map the on-disk compressor id.
    pub fn from_id(id: u16) -> Self {
        match id {
            0 => CompressionKind::None,
            1 => CompressionKind::Gzip,
            2 => CompressionKind::Lzma,
            3 => CompressionKind::Lzo,
            4 => CompressionKind::Xz,
            5 => CompressionKind::Lz4,
            6 => CompressionKind::Zstd,
            other => CompressionKind::Unknown(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionKind::None => "NO",
            CompressionKind::Gzip => "ZLIB",
            CompressionKind::Lzma => "LZMA",
            CompressionKind::Lzo => "LZO",
            CompressionKind::Xz => "XZ",
            CompressionKind::Lz4 => "LZ4",
            CompressionKind::Zstd => "ZSTD",
            CompressionKind::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionKind::Unknown(id) => write!(f, "UNKNOWN({id})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Container-level metadata exposed by a codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperblockInfo {
    pub magic: u32,
    pub compression: CompressionKind,
    pub block_size: u32,
    pub bytes_used: u64,
    pub inode_count: u32,
    pub fragment_count: u32,
    pub inode_table_offset: u64,
    pub directory_table_offset: u64,
    pub fragment_table_offset: u64,
    pub id_table_offset: u64,
    pub xattr_table_offset: u64,
}

impl SuperblockInfo {
    /// Aligned, human-readable table of the superblock fields.
    pub fn summary_lines(&self) -> Vec<String> {
        let rule = "-".repeat(40);
        let row = |label: &str, value: String| format!("{:<25}{}", format!("{label}:"), value);
        vec![
            rule.clone(),
            "Superblock Information:".to_string(),
            rule.clone(),
            row("Magic", format!("0x{:X}", self.magic)),
            row("Filesystem Size", format!("{} bytes", self.bytes_used)),
            row("Compression", self.compression.to_string()),
            row("Block Size", self.block_size.to_string()),
            row("Number of Inodes", self.inode_count.to_string()),
            row("Number of Fragments", self.fragment_count.to_string()),
            row("Inode Table Start", format!("0x{:X}", self.inode_table_offset)),
            row("Directory Table Start", format!("0x{:X}", self.directory_table_offset)),
            row("Fragment Table Start", format!("0x{:X}", self.fragment_table_offset)),
            row("ID Table Start", format!("0x{:X}", self.id_table_offset)),
            row("xattr Table Start", format!("0x{:X}", self.xattr_table_offset)),
            rule,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_ids_round_trip_through_names() {
        assert_eq!(CompressionKind::from_id(1), CompressionKind::Gzip);
        assert_eq!(CompressionKind::from_id(4).to_string(), "XZ");
        assert_eq!(CompressionKind::from_id(42).to_string(), "UNKNOWN(42)");
    }

    #[test]
    fn summary_lines_align_labels() {
        let sb = SuperblockInfo {
            magic: SQUASHFS_MAGIC,
            compression: CompressionKind::Xz,
            block_size: 131072,
            bytes_used: 5159718,
            inode_count: 12,
            fragment_count: 3,
            inode_table_offset: 0x4e0000,
            directory_table_offset: 0x4e1000,
            fragment_table_offset: 0x4e2000,
            id_table_offset: 0x4e3000,
            xattr_table_offset: u64::MAX,
        };
        let lines = sb.summary_lines();
        assert_eq!(lines.len(), 15);
        assert_eq!(lines[3], format!("{:<25}0x73717368", "Magic:"));
        assert!(lines.iter().any(|l| l.starts_with("Compression:") && l.ends_with("XZ")));
        assert!(lines.iter().any(|l| l.contains("0xFFFFFFFFFFFFFFFF")));
    }
}
