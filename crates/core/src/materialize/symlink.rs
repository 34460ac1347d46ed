use std::fs;
use std::io;
use std::path::Path;

use crate::materialize::EntryStatus;
use crate::report::Reporter;

/// Text written in place of a link the host refused to create.
pub const PLACEHOLDER_PREFIX: &str = "Symlink to: ";

/// Creates a symbolic link at `link` pointing to `target`.
pub type Linker = fn(target: &Path, link: &Path) -> io::Result<()>;

/// Native link creation for the current host.
pub fn native_linker(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_file(target, link)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, link);
        Err(io::Error::new(io::ErrorKind::Unsupported, "symbolic links are not supported"))
    }
}

/// Linker that always refuses, forcing placeholder files.
pub fn disabled_linker(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "symbolic links disabled"))
}

/// Placeholder content recording the intended link target.
pub fn placeholder_text(target: &str) -> String {
    format!("{PLACEHOLDER_PREFIX}{target}")
}

/// Link target recorded in placeholder content, if `content` is one.
pub fn parse_placeholder(content: &[u8]) -> Option<String> {
    std::str::from_utf8(content).ok()?.strip_prefix(PLACEHOLDER_PREFIX).map(str::to_string)
}

/// Recreates symbolic links, degrading to a placeholder file when the host
/// cannot create a real link.
///
/// Placeholders are lossy: they are regular files and are reported as
/// [`EntryStatus::Placeholder`], never as a plain success.
#[derive(Clone, Copy)]
pub struct SymlinkReconciler {
    linker: Linker,
}

impl std::fmt::Debug for SymlinkReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymlinkReconciler").finish_non_exhaustive()
    }
}

impl Default for SymlinkReconciler {
    fn default() -> Self {
        Self { linker: native_linker }
    }
}

impl SymlinkReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_linker(linker: Linker) -> Self {
        Self { linker }
    }

    /// Reconciler that never attempts a real link.
    pub fn placeholders_only() -> Self {
        Self::with_linker(disabled_linker)
    }

    /// Make `link_path` a link to `target`. Never returns an error; failures
    /// come back as [`EntryStatus::Failed`]. Log lines name the link by
    /// `entry_path`, its path inside the image.
    pub fn reconcile(
        &self,
        entry_path: &str,
        target: &str,
        link_path: &Path,
        reporter: &dyn Reporter,
    ) -> EntryStatus {
        reporter.info(&format!("Creating symlink: {entry_path} -> {target}"));

        if let Err(err) = clear_existing(link_path) {
            let reason = format!("cannot replace {}: {err}", link_path.display());
            reporter.error(&format!("Error handling symlink {entry_path}: {reason}"));
            return EntryStatus::Failed { reason };
        }

        let link_err = match (self.linker)(Path::new(target), link_path) {
            Ok(()) => return EntryStatus::Written,
            Err(err) => err,
        };

        match fs::write(link_path, placeholder_text(target)) {
            Ok(()) => {
                reporter.error(&format!(
                    "Symlink {entry_path} stored as placeholder file ({link_err})"
                ));
                EntryStatus::Placeholder {
                    target: target.to_string(),
                    reason: link_err.to_string(),
                }
            }
            Err(write_err) => {
                let reason = format!("link failed ({link_err}); placeholder failed ({write_err})");
                reporter.error(&format!("Error handling symlink {entry_path}: {reason}"));
                EntryStatus::Failed { reason }
            }
        }
    }
}

/// Remove whatever non-directory node sits at `path`, including dangling links.
fn clear_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {
            Err(io::Error::new(io::ErrorKind::AlreadyExists, "a directory is in the way"))
        }
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Level, MemoryReporter};

    fn refuse(_target: &Path, _link: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "no privilege"))
    }

    #[test]
    fn placeholder_round_trips_target() {
        let text = placeholder_text("../lib/libc.so.6");
        assert_eq!(text, "Symlink to: ../lib/libc.so.6");
        assert_eq!(parse_placeholder(text.as_bytes()).as_deref(), Some("../lib/libc.so.6"));
        assert_eq!(parse_placeholder(b"regular content"), None);
    }

    #[test]
    fn refused_link_falls_back_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("sh");
        let reporter = MemoryReporter::new();

        let reconciler = SymlinkReconciler::with_linker(refuse);
        let status = reconciler.reconcile("/bin/sh", "busybox", &link, &reporter);

        match status {
            EntryStatus::Placeholder { target, reason } => {
                assert_eq!(target, "busybox");
                assert!(reason.contains("no privilege"));
            }
            other => panic!("expected placeholder, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(&link).unwrap(), "Symlink to: busybox");
        assert!(reporter.contains(Level::Error, "Symlink /bin/sh stored as placeholder"));
        assert!(reporter.contains(Level::Info, "Creating symlink: /bin/sh -> busybox"));
        let host = link.display().to_string();
        assert!(!reporter.contains(Level::Info, &host));
        assert!(!reporter.contains(Level::Error, &host));
    }

    #[test]
    fn existing_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("l");
        fs::write(&link, b"stale").unwrap();

        let status = SymlinkReconciler::placeholders_only().reconcile(
            "/l",
            "target",
            &link,
            &MemoryReporter::new(),
        );
        assert!(matches!(status, EntryStatus::Placeholder { .. }));
        assert_eq!(fs::read_to_string(&link).unwrap(), "Symlink to: target");
    }

    #[test]
    fn directory_in_the_way_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("d");
        fs::create_dir(&link).unwrap();

        let reporter = MemoryReporter::new();
        let status = SymlinkReconciler::new().reconcile("/d", "x", &link, &reporter);
        assert!(matches!(status, EntryStatus::Failed { .. }));
        assert!(reporter.contains(Level::Error, "Error handling symlink /d:"));
        assert!(link.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn native_link_replaces_dangling_link() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("l");
        std::os::unix::fs::symlink("nowhere", &link).unwrap();

        let reporter = MemoryReporter::new();
        let status = SymlinkReconciler::new().reconcile("/l", "somewhere", &link, &reporter);
        assert_eq!(status, EntryStatus::Written);
        assert_eq!(fs::read_link(&link).unwrap(), Path::new("somewhere"));
    }
}
