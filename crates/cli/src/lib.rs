use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use carver_core::report::{ConsoleReporter, NullReporter, Reporter};

pub mod commands;

/// Canonicalize the path if possible, falling back to the given path
/// relative to the current working directory.
pub fn canonicalize_or_current(path: &Path) -> Result<PathBuf> {
    if path == Path::new(".") {
        return env::current_dir().context("Failed to get current directory");
    }
    // Output roots usually do not exist yet, so canonicalize can fail.
    match path.canonicalize() {
        Ok(p) => Ok(p),
        Err(_) if path.is_absolute() => Ok(path.to_path_buf()),
        Err(_) => {
            let cwd = env::current_dir().context("Failed to get current directory")?;
            Ok(cwd.join(path))
        }
    }
}

/// Console reporter, or a silent one when `quiet` is set.
pub fn reporter_for(quiet: bool) -> Box<dyn Reporter> {
    if quiet {
        Box::new(NullReporter)
    } else {
        Box::new(ConsoleReporter)
    }
}
