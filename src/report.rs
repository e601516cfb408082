//! Fatal and per-operation error reporting
//!
//! Two tiers of failure:
//! - [`FatalError`]: the configuration is unusable. Propagated up to the CLI,
//!   which prints it and exits with a failure status.
//! - Per-operation errors (one file fails to compile, a watcher callback
//!   fails): handed to [`ErrorReporter::error`], logged, and the run goes on.

use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

use crate::config::loader::ConfigError;
use crate::livereload::LiveReloadError;
use crate::watch::WatchError;

/// Terminal bell.
pub const BEL: &str = "\x07";

/// Hint printed after every fatal error.
pub const USAGE_HINT: &str = "Use 'assetflow usage' for help";

/// Unrecoverable configuration or setup failure.
#[derive(Debug, Error)]
pub enum FatalError {
    /// Neither the stylesheet nor the output directory was given
    #[error("Insufficient arguments, cannot proceed. Use -s or -c")]
    InsufficientArguments,
    /// A given directory does not exist or is not a directory
    #[error("{label} directory '{}' is not valid", .path.display())]
    InvalidDirectory { label: &'static str, path: PathBuf },
    /// No conventional candidate directory exists
    #[error("Provide valid {label} directory")]
    UnresolvedDirectory { label: &'static str },
    /// A configured entry stylesheet is missing
    #[error("SCSS file '{}' is invalid", .0.display())]
    InvalidEntryFile(PathBuf),
    /// Compile style outside compact|compressed|expanded|nested
    #[error("SCSS Style {0} is invalid")]
    InvalidStyle(String),
    /// Browser targets could not be parsed
    #[error("Autoprefixer browsers are invalid: {0}")]
    InvalidBrowsers(String),
    /// Project config file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A watcher could not be started
    #[error(transparent)]
    Watch(#[from] WatchError),
    /// The live-reload server could not be started
    #[error(transparent)]
    LiveReload(#[from] LiveReloadError),
}

impl FatalError {
    /// The offending path, when the error is about one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            FatalError::InvalidDirectory { path, .. } => Some(path),
            FatalError::InvalidEntryFile(path) => Some(path),
            _ => None,
        }
    }

    /// Write the error and the usage hint to `out`, with a bell if `beep`.
    pub fn write_to(&self, out: &mut impl Write, beep: bool) -> std::io::Result<()> {
        let bell = if beep { BEL } else { "" };
        writeln!(out, "Error: {}{}", self, bell)?;
        writeln!(out, "{}{}", USAGE_HINT, bell)
    }
}

/// Reports task completion and recoverable errors.
///
/// Carries the `--beep` setting so tasks don't need a global.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorReporter {
    beep: bool,
}

impl ErrorReporter {
    pub fn new(beep: bool) -> Self {
        Self { beep }
    }

    pub fn beeps(&self) -> bool {
        self.beep
    }

    /// Log a recoverable error and keep going.
    pub fn error(&self, message: impl std::fmt::Display) {
        error!("{}{}", message, self.bell());
    }

    /// Log `<TASK> Done`.
    pub fn done(&self, task: &str) {
        info!("{} Done{}", task.to_uppercase(), self.bell());
    }

    /// Print a fatal error to stderr.
    pub fn fatal(&self, err: &FatalError) {
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        let _ = err.write_to(&mut handle, self.beep);
    }

    fn bell(&self) -> &'static str {
        if self.beep {
            BEL
        } else {
            ""
        }
    }
}
