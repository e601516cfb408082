//! Stylesheet pipeline: directory resolution, configuration, clean,
//! compile and watch.

pub mod compile;
pub mod config;
pub mod resolve;

pub use compile::{clean, compile_all, compile_entry, CompileError, CompileSummary, CompiledEntry};
pub use config::{CompileStyle, ScssConfig, ScssOptions, DEFAULT_ENTRY, SCSS_EXTENSION};
pub use resolve::{resolve_pair, DirectoryPair, PairRules};

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::logging::section;
use crate::report::ErrorReporter;
use crate::watch::{watch, WatchError, WatchHandle, WatchTarget};

/// Watch the SCSS directory and recompile on every add, change or removal.
///
/// Runs until the returned handle is cancelled.
pub fn watch_stylesheets(
    config: Arc<ScssConfig>,
    debounce: Duration,
    reporter: ErrorReporter,
) -> Result<WatchHandle, WatchError> {
    let target = WatchTarget::recursive(config.scss_dir()).with_extension(SCSS_EXTENSION);

    section(" scsswatch > ");
    info!("Watching for SCSS changes:");
    info!("  {}", target.pattern());
    section(" < scsswatch ");

    watch(vec![target], debounce, reporter, move |events| {
        for event in events {
            info!("File {} was {}", event.path.display(), event.kind.verb());
        }
        // Per-file failures are already reported by compile_all.
        compile_all(&config, &reporter);
        Ok(())
    })
}
