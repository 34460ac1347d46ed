use std::path::Path;

use anyhow::{Context, Result};

use carver_core::image::SuperblockInfo;

use crate::commands::util::default_codec;

/// Open a stored container and print its superblock.
pub fn superblock_command(image: &Path, json: bool) -> Result<SuperblockInfo> {
    let codec = default_codec();
    let opened = codec
        .open(image)
        .with_context(|| format!("Failed to open container {}", image.display()))?;
    let superblock = opened.superblock().clone();

    if json {
        let serialized = serde_json::to_string_pretty(&superblock)
            .context("Failed to serialize superblock to JSON")?;
        println!("{}", serialized);
    } else {
        for line in superblock.summary_lines() {
            println!("{line}");
        }
    }

    Ok(superblock)
}
