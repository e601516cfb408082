//! Source/output directory pair resolution
//!
//! Either directory may be omitted; the missing one is located by probing
//! conventional neighbours of the given one.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::paths::{is_valid_path, PathKind};
use crate::report::FatalError;

/// A validated source/output directory pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPair {
    pub source: PathBuf,
    pub output: PathBuf,
}

/// Labels and candidate suffixes for one kind of directory pair.
#[derive(Debug, Clone)]
pub struct PairRules {
    /// Label of the source side in messages ("SCSS")
    pub source_label: &'static str,
    /// Label of the output side in messages ("CSS")
    pub output_label: &'static str,
    /// Suffixes joined onto the source dir to find the output dir, in order
    pub output_candidates: Vec<PathBuf>,
    /// Suffixes joined onto the output dir to find the source dir, in order
    pub source_candidates: Vec<PathBuf>,
}

impl PairRules {
    /// Stylesheet rules: a sibling, then a child, `css` (or `scss`) folder.
    pub fn stylesheets() -> Self {
        Self {
            source_label: "SCSS",
            output_label: "CSS",
            output_candidates: vec![Path::new("..").join("css"), PathBuf::from("css")],
            source_candidates: vec![Path::new("..").join("scss"), PathBuf::from("scss")],
        }
    }
}

/// Resolve the directory pair, inferring whichever side is missing.
///
/// Both given: each is validated, no search happens. Neither given, a given
/// path that is not a directory, or no valid candidate: fatal.
pub fn resolve_pair(
    source: Option<&Path>,
    output: Option<&Path>,
    rules: &PairRules,
) -> Result<DirectoryPair, FatalError> {
    let source = source.filter(|p| !p.as_os_str().is_empty());
    let output = output.filter(|p| !p.as_os_str().is_empty());

    match (source, output) {
        (None, None) => Err(FatalError::InsufficientArguments),
        (Some(source), Some(output)) => Ok(DirectoryPair {
            source: require_dir(source, rules.source_label)?,
            output: require_dir(output, rules.output_label)?,
        }),
        (Some(source), None) => {
            let source = require_dir(source, rules.source_label)?;
            let output = locate(&source, &rules.output_candidates, rules.output_label)?;
            Ok(DirectoryPair { source, output })
        }
        (None, Some(output)) => {
            let output = require_dir(output, rules.output_label)?;
            let source = locate(&output, &rules.source_candidates, rules.source_label)?;
            Ok(DirectoryPair { source, output })
        }
    }
}

fn require_dir(path: &Path, label: &'static str) -> Result<PathBuf, FatalError> {
    if is_valid_path(path, PathKind::Directory) {
        Ok(path.to_path_buf())
    } else {
        Err(FatalError::InvalidDirectory { label, path: path.to_path_buf() })
    }
}

fn locate(base: &Path, suffixes: &[PathBuf], label: &'static str) -> Result<PathBuf, FatalError> {
    info!("{} directory not known, trying to locate...", label);
    for suffix in suffixes {
        let candidate = base.join(suffix);
        info!("Checking {} directory {}", label, candidate.display());
        if is_valid_path(&candidate, PathKind::Directory) {
            return Ok(candidate);
        }
    }
    Err(FatalError::UnresolvedDirectory { label })
}
