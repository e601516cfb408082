//! Filesystem watching with debouncing
//!
//! [`watch`] registers a debounced watcher over a set of [`WatchTarget`]s and
//! dispatches batches of relevant [`WatchEvent`]s to a callback on a
//! dedicated thread. The returned [`WatchHandle`] is the subscription:
//! cancelling (or dropping) it unregisters the watcher and stops dispatch.

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::paths::{files_recursive, to_slash};
use crate::report::ErrorReporter;

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch {}: {source}", .path.display())]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    /// Watch root not found
    #[error("Watch directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// Dispatch thread could not be spawned
    #[error("Failed to start watch thread: {0}")]
    Thread(#[source] std::io::Error),
    /// Event handler failed (non-fatal, continues watching)
    #[error("Watch handler failed: {0}")]
    HandlerFailed(String),
}

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

impl ChangeKind {
    pub fn verb(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Changed => "changed",
            ChangeKind::Removed => "removed",
        }
    }
}

/// A relevant change to a watched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// A directory to watch and the files in it that matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub root: PathBuf,
    pub recursive: bool,
    /// Only files with this extension (case-insensitive); `None` for all
    pub extension: Option<String>,
}

impl WatchTarget {
    /// Every file under `root`, recursively.
    pub fn recursive(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), recursive: true, extension: None }
    }

    /// Files directly inside `root` only.
    pub fn flat(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), recursive: false, extension: None }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = Some(extension.to_lowercase());
        self
    }

    /// Whether a changed path belongs to this target.
    pub fn matches(&self, path: &Path) -> bool {
        let under_root = if self.recursive {
            path.starts_with(&self.root)
        } else {
            path.parent() == Some(self.root.as_path())
        };
        under_root && self.extension_matches(path)
    }

    /// Display pattern: `root/**/*.ext` or `root/*.ext`.
    pub fn pattern(&self) -> String {
        let file = match &self.extension {
            Some(ext) => format!("*.{}", ext),
            None => "*".to_string(),
        };
        let pattern = if self.recursive { self.root.join("**").join(file) } else { self.root.join(file) };
        to_slash(&pattern)
    }

    /// Absolute, symlink-free root; the watcher reports absolute paths.
    fn canonical(self) -> Result<Self, WatchError> {
        if !self.root.is_dir() {
            return Err(WatchError::SourceNotFound(self.root));
        }
        match self.root.canonicalize() {
            Ok(root) => Ok(Self { root, ..self }),
            Err(_) => Err(WatchError::SourceNotFound(self.root)),
        }
    }

    fn extension_matches(&self, path: &Path) -> bool {
        match &self.extension {
            None => true,
            Some(wanted) => path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase() == *wanted)
                .unwrap_or(false),
        }
    }

    fn existing_files(&self) -> Vec<PathBuf> {
        let files = if self.recursive {
            files_recursive(&self.root)
        } else {
            std::fs::read_dir(&self.root)
                .map(|entries| entries.filter_map(Result::ok).map(|e| e.path()).collect())
                .unwrap_or_default()
        };
        files.into_iter().filter(|p| p.is_file() && self.matches(p)).collect()
    }
}

/// Message consumed by the dispatch loop.
#[derive(Debug)]
enum WatchMessage {
    Paths(Vec<PathBuf>),
    Error(String),
    Stop,
}

/// A running watch subscription.
pub struct WatchHandle {
    debouncer: Option<Debouncer<RecommendedWatcher>>,
    sender: Sender<WatchMessage>,
    thread: Option<JoinHandle<()>>,
    patterns: Vec<String>,
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").field("patterns", &self.patterns).finish()
    }
}

impl WatchHandle {
    /// Display patterns of the watched targets.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Feed paths to the dispatch loop as if the watcher had reported them.
    ///
    /// Paths are canonicalized like the watch roots; a path that no longer
    /// exists is resolved through its parent directory.
    pub fn inject(&self, paths: Vec<PathBuf>) -> bool {
        let paths = paths.into_iter().map(|p| absolute(&p)).collect();
        self.sender.send(WatchMessage::Paths(paths)).is_ok()
    }

    /// Stop watching and wait for the dispatch thread to finish.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    /// Block until the subscription is cancelled elsewhere or the process ends.
    pub fn wait(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn shutdown(&mut self) {
        // Dropping the debouncer unregisters the OS watches.
        self.debouncer.take();
        let _ = self.sender.send(WatchMessage::Stop);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Watch `targets` and call `on_change` with each debounced batch of
/// relevant events.
///
/// Handler errors and watcher errors are reported through `reporter`; the
/// watch keeps running.
pub fn watch<F>(
    targets: Vec<WatchTarget>,
    debounce: Duration,
    reporter: ErrorReporter,
    on_change: F,
) -> Result<WatchHandle, WatchError>
where
    F: FnMut(&[WatchEvent]) -> Result<(), WatchError> + Send + 'static,
{
    let patterns = targets.iter().map(WatchTarget::pattern).collect();
    let targets = targets.into_iter().map(WatchTarget::canonical).collect::<Result<Vec<_>, _>>()?;

    let (tx, rx) = channel();
    let debounce_tx = tx.clone();
    let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
        let message = match result {
            Ok(events) => WatchMessage::Paths(events.into_iter().map(|e| e.path).collect()),
            Err(error) => WatchMessage::Error(format!("{:?}", error)),
        };
        let _ = debounce_tx.send(message);
    })
    .map_err(WatchError::WatcherInit)?;

    for target in &targets {
        let mode = if target.recursive { RecursiveMode::Recursive } else { RecursiveMode::NonRecursive };
        debouncer
            .watcher()
            .watch(&target.root, mode)
            .map_err(|source| WatchError::WatchPath { path: target.root.clone(), source })?;
    }

    let thread = spawn_dispatch(targets, rx, reporter, on_change)?;

    Ok(WatchHandle { debouncer: Some(debouncer), sender: tx, thread: Some(thread), patterns })
}

fn spawn_dispatch<F>(
    targets: Vec<WatchTarget>,
    rx: Receiver<WatchMessage>,
    reporter: ErrorReporter,
    on_change: F,
) -> Result<JoinHandle<()>, WatchError>
where
    F: FnMut(&[WatchEvent]) -> Result<(), WatchError> + Send + 'static,
{
    std::thread::Builder::new()
        .name("assetflow-watch".to_string())
        .spawn(move || dispatch_loop(&targets, rx, reporter, on_change))
        .map_err(WatchError::Thread)
}

fn dispatch_loop<F>(targets: &[WatchTarget], rx: Receiver<WatchMessage>, reporter: ErrorReporter, mut on_change: F)
where
    F: FnMut(&[WatchEvent]) -> Result<(), WatchError>,
{
    let mut known: HashSet<PathBuf> = targets.iter().flat_map(WatchTarget::existing_files).collect();

    while let Ok(message) = rx.recv() {
        match message {
            WatchMessage::Paths(paths) => {
                let events = classify(targets, &mut known, paths);
                if events.is_empty() {
                    continue;
                }
                if let Err(e) = on_change(&events) {
                    reporter.error(e);
                }
            }
            WatchMessage::Error(error) => {
                warn!("Watch error: {}", error);
                warn!("Continuing to watch...");
            }
            WatchMessage::Stop => break,
        }
    }
    debug!("Watch dispatch stopped");
}

fn absolute(path: &Path) -> PathBuf {
    if let Ok(path) = path.canonicalize() {
        return path;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
            parent.canonicalize().map(|p| p.join(name)).unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

/// Turn raw changed paths into de-duplicated, relevant events.
fn classify(targets: &[WatchTarget], known: &mut HashSet<PathBuf>, paths: Vec<PathBuf>) -> Vec<WatchEvent> {
    let mut seen = HashSet::new();
    let mut events = Vec::new();

    for path in paths {
        if !seen.insert(path.clone()) || !targets.iter().any(|t| t.matches(&path)) {
            continue;
        }
        let kind = if path.is_file() {
            if known.insert(path.clone()) {
                ChangeKind::Added
            } else {
                ChangeKind::Changed
            }
        } else if path.exists() {
            continue;
        } else {
            known.remove(&path);
            ChangeKind::Removed
        };
        events.push(WatchEvent { path, kind });
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;
    use tempfile::TempDir;

    fn wait_for<T>(shared: &Arc<Mutex<Vec<T>>>, count: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if shared.lock().unwrap().len() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn test_target_matches() {
        let scss = WatchTarget::recursive("/p/scss").with_extension("SCSS");
        assert!(scss.matches(Path::new("/p/scss/style.scss")));
        assert!(scss.matches(Path::new("/p/scss/partials/_a.scss")));
        assert!(!scss.matches(Path::new("/p/scss/notes.txt")));
        assert!(!scss.matches(Path::new("/p/other/style.scss")));

        let css = WatchTarget::flat("/p/css").with_extension("css");
        assert!(css.matches(Path::new("/p/css/style.css")));
        assert!(!css.matches(Path::new("/p/css/vendor/x.css")));
    }

    #[test]
    fn test_target_pattern() {
        assert_eq!(WatchTarget::recursive("web").pattern(), "web/**/*");
        assert_eq!(WatchTarget::recursive("scss").with_extension("scss").pattern(), "scss/**/*.scss");
        assert_eq!(WatchTarget::flat("css").with_extension("css").pattern(), "css/*.css");
    }

    #[test]
    fn test_classify_added_changed_removed() {
        let temp = TempDir::new().unwrap();
        let targets = vec![WatchTarget::recursive(temp.path()).with_extension("scss")];
        let file = temp.path().join("a.scss");
        let mut known = HashSet::new();

        fs::write(&file, "").unwrap();
        let events = classify(&targets, &mut known, vec![file.clone(), file.clone()]);
        assert_eq!(events, vec![WatchEvent { path: file.clone(), kind: ChangeKind::Added }]);

        let events = classify(&targets, &mut known, vec![file.clone()]);
        assert_eq!(events[0].kind, ChangeKind::Changed);

        fs::remove_file(&file).unwrap();
        let events = classify(&targets, &mut known, vec![file.clone(), temp.path().join("x.txt")]);
        assert_eq!(events, vec![WatchEvent { path: file, kind: ChangeKind::Removed }]);
    }

    #[test]
    fn test_classify_skips_directories() {
        let temp = TempDir::new().unwrap();
        let targets = vec![WatchTarget::recursive(temp.path())];
        let sub = temp.path().join("sub");
        fs::create_dir(&sub).unwrap();
        assert!(classify(&targets, &mut HashSet::new(), vec![sub]).is_empty());
    }

    #[test]
    fn test_watch_missing_root() {
        let result = watch(
            vec![WatchTarget::recursive("/nonexistent/path")],
            Duration::from_millis(50),
            ErrorReporter::default(),
            |_| Ok(()),
        );
        assert!(matches!(result, Err(WatchError::SourceNotFound(_))));
    }

    #[test]
    fn test_injected_events_dispatch_then_cancel() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("style.scss");
        fs::write(&file, "").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = watch(
            vec![WatchTarget::recursive(temp.path()).with_extension("scss")],
            Duration::from_secs(60),
            ErrorReporter::default(),
            move |events| {
                sink.lock().unwrap().extend(events.iter().cloned());
                Ok(())
            },
        )
        .unwrap();

        assert!(handle.inject(vec![file.clone(), temp.path().join("ignored.txt")]));
        assert!(wait_for(&seen, 1));
        let expected = file.canonicalize().unwrap();
        assert_eq!(seen.lock().unwrap()[0], WatchEvent { path: expected, kind: ChangeKind::Changed });

        handle.cancel();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_handler_error_keeps_watching() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.css");
        fs::write(&file, "").unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let handle = watch(
            vec![WatchTarget::flat(temp.path())],
            Duration::from_secs(60),
            ErrorReporter::default(),
            move |_| {
                sink.lock().unwrap().push(());
                Err(WatchError::HandlerFailed("boom".into()))
            },
        )
        .unwrap();

        handle.inject(vec![file.clone()]);
        handle.inject(vec![file]);
        assert!(wait_for(&calls, 2));
        handle.cancel();
    }

    #[test]
    #[serial_test::serial]
    fn test_relative_root_receives_events() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("scss")).unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp.path()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = watch(
            vec![WatchTarget::recursive("scss").with_extension("scss")],
            Duration::from_millis(50),
            ErrorReporter::default(),
            move |events| {
                sink.lock().unwrap().extend(events.iter().cloned());
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(handle.patterns(), ["scss/**/*.scss"]);

        std::thread::sleep(Duration::from_millis(100));
        fs::write(Path::new("scss").join("style.scss"), "a { b: c; }").unwrap();
        let dispatched = wait_for(&seen, 1);
        handle.cancel();
        std::env::set_current_dir(previous).unwrap();

        assert!(dispatched);
        let event = seen.lock().unwrap()[0].clone();
        assert!(event.path.is_absolute());
        assert!(event.path.ends_with("scss/style.scss"));
    }

    #[test]
    #[serial_test::serial]
    fn test_injected_relative_path_matches() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("css")).unwrap();
        fs::write(temp.path().join("css").join("a.css"), "").unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp.path()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = watch(
            vec![WatchTarget::flat("css").with_extension("css")],
            Duration::from_secs(60),
            ErrorReporter::default(),
            move |events| {
                sink.lock().unwrap().extend(events.iter().cloned());
                Ok(())
            },
        )
        .unwrap();
        handle.inject(vec![PathBuf::from("css/a.css")]);
        let dispatched = wait_for(&seen, 1);
        handle.cancel();
        std::env::set_current_dir(previous).unwrap();

        assert!(dispatched);
        assert_eq!(seen.lock().unwrap()[0].kind, ChangeKind::Changed);
    }

    #[test]
    #[serial_test::serial]
    fn test_real_filesystem_event() {
        let temp = TempDir::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = watch(
            vec![WatchTarget::recursive(temp.path()).with_extension("scss")],
            Duration::from_millis(50),
            ErrorReporter::default(),
            move |events| {
                sink.lock().unwrap().extend(events.iter().cloned());
                Ok(())
            },
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(100));
        fs::write(temp.path().join("new.scss"), "a { b: c; }").unwrap();
        assert!(wait_for(&seen, 1));
        assert_eq!(seen.lock().unwrap()[0].kind, ChangeKind::Added);
        handle.cancel();
    }
}
