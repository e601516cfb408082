//! Path validation and glob helpers
//!
//! Every path that comes from the command line or the config file is probed
//! here before it is trusted.

use glob::glob;
use std::fs;
use std::path::{Path, PathBuf};

/// Kind of filesystem object a path is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// A directory
    Directory,
    /// A regular file
    File,
}

/// Check whether `path` exists and is of the expected kind.
///
/// Never fails: any error while probing (missing path, permission denied,
/// broken symlink) is reported as "not valid".
///
/// # Examples
///
/// ```
/// use assetflow::paths::{is_valid_path, PathKind};
///
/// assert!(is_valid_path(".", PathKind::Directory));
/// assert!(!is_valid_path(".", PathKind::File));
/// assert!(!is_valid_path("/definitely/not/here", PathKind::Directory));
/// ```
pub fn is_valid_path(path: impl AsRef<Path>, kind: PathKind) -> bool {
    match fs::metadata(path.as_ref()) {
        Ok(meta) => match kind {
            PathKind::Directory => meta.is_dir(),
            PathKind::File => meta.is_file(),
        },
        Err(_) => false,
    }
}

/// Glob pattern matching every source map directly inside `dir`.
pub fn map_file_pattern(dir: &Path) -> PathBuf {
    dir.join("*.map")
}

/// Find files in `dir` (non-recursive) with the given extension, sorted.
pub fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let pattern = dir.join(format!("*.{}", extension));
    let mut files = glob_files(&pattern);
    files.sort();
    files
}

/// Find every regular file under `dir`, recursively, sorted.
pub fn files_recursive(dir: &Path) -> Vec<PathBuf> {
    let mut files = glob_files(&recursive_pattern(dir));
    files.sort();
    files
}

/// `<dir>/**/*`, the display form of a recursive watch.
pub fn recursive_pattern(dir: &Path) -> PathBuf {
    dir.join("**").join("*")
}

/// Convert a pattern to forward slashes for display and glob matching.
pub fn to_slash(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Delete every file matching `pattern`. Returns the removed paths.
///
/// Unreadable entries and files that vanish before removal are skipped;
/// no matches is not an error.
pub fn remove_matching(pattern: &Path) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for path in glob_files(pattern) {
        if fs::remove_file(&path).is_ok() {
            removed.push(path);
        }
    }
    removed
}

fn glob_files(pattern: &Path) -> Vec<PathBuf> {
    let pattern = to_slash(pattern);
    match glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).filter(|p| p.is_file()).collect(),
        Err(_) => Vec::new(),
    }
}
