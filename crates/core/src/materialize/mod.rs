//! Reproducing a container's entry tree on the host filesystem.
//!
//! Materialization is best-effort: each entry is handled independently and a
//! failure on one entry is recorded and skipped rather than aborting the walk.
//! Every written path stays under the target root; entry paths that would
//! escape it are rejected, and existing links below the root are never
//! followed when creating parents or files.

mod symlink;

pub use symlink::{
    disabled_linker, native_linker, parse_placeholder, placeholder_text, Linker,
    SymlinkReconciler, PLACEHOLDER_PREFIX,
};

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image::{CodecError, EntryKind, EntryLabel, ImageCodec, ImageEntry, SuperblockInfo};
use crate::report::Reporter;

/// Why an entry path was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path escapes the output root through '..': {0}")]
    ParentEscape(String),

    #[error("path is still absolute after stripping the leading separator: {0}")]
    Absolute(String),

    #[error("path segment {segment:?} is not a plain name: {path}")]
    InvalidSegment { path: String, segment: String },
}

/// Per-entry failure while writing to disk.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("refusing to write through symlink {}", .0.display())]
    LinkedAncestor(PathBuf),

    #[error("{} exists and is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl EntryError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        EntryError::Io { action, path: path.to_path_buf(), source }
    }
}

/// Result of materializing one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    Written,
    /// A symlink stored as a placeholder file. Degraded, not a success.
    Placeholder { target: String, reason: String },
    Skipped { reason: String },
    Failed { reason: String },
}

impl EntryStatus {
    pub fn is_written(&self) -> bool {
        matches!(self, EntryStatus::Written)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReport {
    pub path: String,
    pub kind: EntryLabel,
    #[serde(flatten)]
    pub status: EntryStatus,
}

/// Tallies over a materialization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub entries: usize,
    pub directories: usize,
    pub files: usize,
    pub symlinks: usize,
    pub placeholders: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Aggregate of every entry processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializeSummary {
    pub root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superblock: Option<SuperblockInfo>,
    pub counts: SummaryCounts,
    pub entries: Vec<EntryReport>,
}

impl MaterializeSummary {
    fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf(), ..Self::default() }
    }

    fn record(&mut self, path: String, kind: EntryLabel, status: EntryStatus) {
        let counts = &mut self.counts;
        counts.entries += 1;
        match (&status, kind) {
            (EntryStatus::Written, EntryLabel::Directory) => counts.directories += 1,
            (EntryStatus::Written, EntryLabel::File) => counts.files += 1,
            (EntryStatus::Written, _) => counts.symlinks += 1,
            (EntryStatus::Placeholder { .. }, _) => counts.placeholders += 1,
            (EntryStatus::Skipped { .. }, _) => counts.skipped += 1,
            (EntryStatus::Failed { .. }, _) => counts.failed += 1,
        }
        self.entries.push(EntryReport { path, kind, status });
    }

    /// True when every entry was reproduced exactly.
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.status.is_written())
    }

    /// Entries that were not reproduced exactly.
    pub fn issues(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries.iter().filter(|e| !e.status.is_written())
    }

    pub fn find(&self, path: &str) -> Option<&EntryReport> {
        self.entries.iter().find(|e| e.path == path)
    }
}

/// Stage result for materializing a stored container.
#[derive(Debug)]
pub enum MaterializeOutcome {
    Complete(MaterializeSummary),
    /// Some entries were skipped, failed, or degraded to placeholders.
    Partial(MaterializeSummary),
    /// The codec could not open the container; nothing was materialized.
    ContainerMalformed(CodecError),
}

impl MaterializeOutcome {
    pub fn from_summary(summary: MaterializeSummary) -> Self {
        if summary.is_complete() {
            MaterializeOutcome::Complete(summary)
        } else {
            MaterializeOutcome::Partial(summary)
        }
    }

    pub fn summary(&self) -> Option<&MaterializeSummary> {
        match self {
            MaterializeOutcome::Complete(s) | MaterializeOutcome::Partial(s) => Some(s),
            MaterializeOutcome::ContainerMalformed(_) => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, MaterializeOutcome::Complete(_))
    }
}

/// Normalize an entry path into a relative path under the output root.
///
/// Strips a single leading `/`, drops empty and `.` segments, and rejects
/// `..` segments and anything that is not a plain name. An empty result
/// denotes the root itself.
pub fn normalize_entry_path(path: &str) -> Result<PathBuf, PathError> {
    let relative = path.strip_prefix('/').unwrap_or(path);
    if relative.starts_with('/') {
        return Err(PathError::Absolute(path.to_string()));
    }

    let mut out = PathBuf::new();
    for segment in relative.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathError::ParentEscape(path.to_string())),
            name => {
                let mut components = Path::new(name).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => out.push(name),
                    _ => {
                        return Err(PathError::InvalidSegment {
                            path: path.to_string(),
                            segment: name.to_string(),
                        })
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Walks entries and reproduces them under a target root.
#[derive(Debug, Clone, Copy, Default)]
pub struct Materializer {
    reconciler: SymlinkReconciler,
}

impl Materializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reconciler(reconciler: SymlinkReconciler) -> Self {
        Self { reconciler }
    }

    /// Open `container` with `codec` and materialize its entries under
    /// `target_root`.
    pub fn materialize_image(
        &self,
        codec: &dyn ImageCodec,
        container: &Path,
        target_root: &Path,
        reporter: &dyn Reporter,
    ) -> MaterializeOutcome {
        if let Err(err) = fs::create_dir_all(target_root) {
            reporter.error(&format!("Failed to create {}: {err}", target_root.display()));
        }
        reporter.info(&format!("Opening {} image: {}", codec.name(), container.display()));
        let image = match codec.open(container) {
            Ok(image) => image,
            Err(err) => {
                reporter.error(&format!("Error extracting container contents: {err}"));
                return MaterializeOutcome::ContainerMalformed(err);
            }
        };

        for line in image.superblock().summary_lines() {
            reporter.info(&line);
        }

        let mut summary = self.materialize(image.entries(), target_root, reporter);
        summary.superblock = Some(image.superblock().clone());
        MaterializeOutcome::from_summary(summary)
    }

    /// Reproduce `entries` under `target_root`, in iteration order.
    pub fn materialize<'a, I>(
        &self,
        entries: I,
        target_root: &Path,
        reporter: &dyn Reporter,
    ) -> MaterializeSummary
    where
        I: IntoIterator<Item = ImageEntry<'a>>,
    {
        let mut summary = MaterializeSummary::new(target_root);
        if let Err(err) = fs::create_dir_all(target_root) {
            reporter.error(&format!("Failed to create {}: {err}", target_root.display()));
        }

        reporter.info("Extracting files");
        for entry in entries {
            let path = entry.path.clone();
            let kind = entry.kind.label();
            let status = match self.materialize_entry(entry, target_root, reporter) {
                Ok(status) => status,
                Err(err) => {
                    reporter.error(&format!("Error extracting {path}: {err}"));
                    EntryStatus::Failed { reason: err.to_string() }
                }
            };
            summary.record(path, kind, status);
        }

        let c = summary.counts;
        let line = format!(
            "{} entries: {} dirs, {} files, {} symlinks, {} placeholders, {} skipped, {} failed",
            c.entries, c.directories, c.files, c.symlinks, c.placeholders, c.skipped, c.failed
        );
        if summary.is_complete() {
            reporter.success(&format!("Contents extracted successfully ({line})"));
        } else {
            reporter.error(&format!("Contents extracted with issues ({line})"));
        }
        summary
    }

    fn materialize_entry(
        &self,
        entry: ImageEntry<'_>,
        root: &Path,
        reporter: &dyn Reporter,
    ) -> Result<EntryStatus, EntryError> {
        let relative = normalize_entry_path(&entry.path)?;
        let target = root.join(&relative);

        if let EntryKind::Directory = entry.kind {
            ensure_dirs(root, &relative)?;
            return Ok(EntryStatus::Written);
        }

        if relative.as_os_str().is_empty() {
            return Err(PathError::InvalidSegment {
                path: entry.path.clone(),
                segment: String::new(),
            }
            .into());
        }
        ensure_dirs(root, relative.parent().unwrap_or(Path::new("")))?;

        match entry.kind {
            EntryKind::Directory => Ok(EntryStatus::Written),
            EntryKind::File(mut content) => {
                reporter.info(&format!("Extracting: {}", entry.path));
                write_file(&target, &mut content)?;
                Ok(EntryStatus::Written)
            }
            EntryKind::Symlink(link_target) => {
                Ok(self.reconciler.reconcile(&entry.path, &link_target, &target, reporter))
            }
            EntryKind::Other(kind) => {
                reporter.info(&format!("Skipping {kind}: {}", entry.path));
                Ok(EntryStatus::Skipped { reason: format!("unsupported node type: {kind}") })
            }
        }
    }
}

/// Create every directory of `relative` below `root`, refusing to descend
/// through existing symlinks.
fn ensure_dirs(root: &Path, relative: &Path) -> Result<(), EntryError> {
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(EntryError::LinkedAncestor(current));
            }
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(EntryError::NotADirectory(current)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => match fs::create_dir(&current) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists && current.is_dir() => {}
                Err(err) => return Err(EntryError::io("create directory", &current, err)),
            },
            Err(err) => return Err(EntryError::io("inspect", &current, err)),
        }
    }
    Ok(())
}

/// Stream `content` into `target`, replacing any link already there.
fn write_file(target: &Path, content: &mut dyn io::Read) -> Result<(), EntryError> {
    if let Ok(meta) = fs::symlink_metadata(target) {
        if meta.file_type().is_symlink() {
            fs::remove_file(target).map_err(|e| EntryError::io("replace link", target, e))?;
        }
    }

    let file = File::create(target).map_err(|e| EntryError::io("create", target, e))?;
    let mut writer = BufWriter::new(file);
    io::copy(content, &mut writer).map_err(|e| EntryError::io("write", target, e))?;
    writer.flush().map_err(|e| EntryError::io("flush", target, e))?;
    Ok(())
}
