//! Live reload
//!
//! Watches the live-reload directories (and the compiled CSS, when a
//! stylesheet config is active) and tells connected browsers about every
//! change through a LiveReload-protocol server.

pub mod protocol;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, PROTOCOL_OFFICIAL_7, SERVER_NAME};
pub use server::{run_server, serve, LiveReload, LiveReloadError, CLIENT_SCRIPT};

use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::LiveReloadConfig;
use crate::items::ItemList;
use crate::logging::section;
use crate::paths::{is_valid_path, to_slash, PathKind};
use crate::report::{ErrorReporter, FatalError};
use crate::scss::ScssConfig;
use crate::watch::{watch, WatchError, WatchHandle, WatchTarget};

/// Build the reload watch set.
///
/// Every directory in `dirs` is watched recursively; the compiled
/// `<css_dir>/*.css` is added when `scss` is given. A directory that does
/// not exist is fatal.
pub fn reload_targets(dirs: &ItemList, scss: Option<&ScssConfig>) -> Result<Vec<WatchTarget>, FatalError> {
    let mut targets = Vec::new();
    for dir in dirs {
        let path = PathBuf::from(dir);
        if !is_valid_path(&path, PathKind::Directory) {
            return Err(FatalError::InvalidDirectory { label: "Livereload", path });
        }
        targets.push(WatchTarget::recursive(path));
    }
    if let Some(scss) = scss {
        targets.push(WatchTarget::flat(scss.css_dir()).with_extension("css"));
    }
    Ok(targets)
}

/// Watch `targets` and announce every changed path on `reload`.
pub fn start_reload_watch(
    targets: Vec<WatchTarget>,
    debounce: Duration,
    reload: LiveReload,
    reporter: ErrorReporter,
) -> Result<WatchHandle, WatchError> {
    watch(targets, debounce, reporter, move |events| {
        for event in events {
            let path = to_slash(&event.path);
            info!("Reload {} ({})", path, event.kind.verb());
            reload.changed(path);
        }
        Ok(())
    })
}

/// Run the Reload operation. Blocks while the server runs.
///
/// Returns immediately, after two warnings, when there is nothing to watch.
pub fn run_livereload(
    config: &LiveReloadConfig,
    scss: Option<&ScssConfig>,
    debounce: Duration,
    reporter: ErrorReporter,
) -> Result<(), FatalError> {
    let dirs = ItemList::from_items(config.dirs.clone());
    let targets = reload_targets(&dirs, scss)?;
    if targets.is_empty() {
        warn!("Nothing to watch for Livereload");
        warn!("Did you miss the parameter to add livereload files?");
        return Ok(());
    }

    section(" livereload > ");
    info!("Watching for changes:");
    for target in &targets {
        info!("  {}", target.pattern());
    }
    section(" < livereload ");

    let reload = LiveReload::new();
    let handle = start_reload_watch(targets, debounce, reload.clone(), reporter)?;
    let served = run_server(&config.host, config.port, reload);
    handle.cancel();
    served.map_err(FatalError::from)
}
