use std::path::{Path, PathBuf};

/// Default output root, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "extracted_firmware";

/// Logical layout of an extraction run's output on disk.
///
/// This is derived from a chosen root path. It does *not* perform any IO itself;
/// the pipeline creates directories and files as stages produce them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// Root directory of the run's output.
    pub root: PathBuf,
    /// Recovered (decompressed) raw stream.
    pub stream_path: PathBuf,
    /// Container bytes sliced out of the firmware.
    pub container_path: PathBuf,
    /// Materialized container tree.
    pub contents_dir: PathBuf,
    /// Run manifest (JSON).
    pub manifest_path: PathBuf,
}

impl OutputLayout {
    /// Compute the layout for a run rooted at `root`.
    ///
    /// This does *not* touch the filesystem.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let stream_path = root.join("extracted_lzma.bin");
        let container_path = root.join("filesystem.squashfs");
        let contents_dir = root.join("squashfs_contents");
        let manifest_path = root.join("manifest.json");

        Self { root, stream_path, container_path, contents_dir, manifest_path }
    }

    /// Path relative to the root when possible, for compact log lines.
    pub fn relative_display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) => rel.to_string_lossy().to_string(),
            Err(_) => path.to_string_lossy().to_string(),
        }
    }
}
