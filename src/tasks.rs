//! Task sequencing
//!
//! A [`TaskSequencer`] owns the project configuration for one run and
//! executes named [`Task`]s, alone or as one of the fixed [`Pipeline`]s.
//! The stylesheet configuration is resolved on first use and shared by
//! every later task in the same run.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::AssetflowConfig;
use crate::imagemin::run_imagemin;
use crate::livereload::run_livereload;
use crate::minifyjs::{run_minifyjs, MinifyJsOptions};
use crate::report::{ErrorReporter, FatalError};
use crate::scss::{clean, compile_all, watch_stylesheets, ScssConfig, ScssOptions};
use crate::watch::WatchHandle;

/// A single named operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Clean,
    Compile,
    Watch,
    Reload,
    ImageOptimize,
    ScriptMinify,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::Clean => "scss-clean",
            Task::Compile => "scss-preprocess",
            Task::Watch => "scss-watch",
            Task::Reload => "livereload",
            Task::ImageOptimize => "imagemin",
            Task::ScriptMinify => "minifyjs",
        }
    }

    /// Whether the task needs the stylesheet configuration.
    pub fn uses_stylesheets(&self) -> bool {
        matches!(self, Task::Clean | Task::Compile | Task::Watch)
    }
}

/// Fixed task sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// clean, compile, watch, reload; keeps running
    Default,
    /// clean, compile; then exits
    CompileOnly,
}

impl Pipeline {
    pub fn tasks(&self) -> &'static [Task] {
        match self {
            Pipeline::Default => &[Task::Clean, Task::Compile, Task::Watch, Task::Reload],
            Pipeline::CompileOnly => &[Task::Clean, Task::Compile],
        }
    }
}

/// Run-wide switches from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    pub dev: bool,
    pub sourcemap: bool,
}

/// Executes tasks against one configuration.
#[derive(Debug)]
pub struct TaskSequencer {
    config: AssetflowConfig,
    flags: RunFlags,
    reporter: ErrorReporter,
    stylesheets: Option<Arc<ScssConfig>>,
    watches: Vec<WatchHandle>,
}

impl TaskSequencer {
    pub fn new(config: AssetflowConfig, flags: RunFlags, reporter: ErrorReporter) -> Self {
        Self { config, flags, reporter, stylesheets: None, watches: Vec::new() }
    }

    /// Use an already-resolved stylesheet configuration.
    pub fn with_stylesheets(mut self, stylesheets: ScssConfig) -> Self {
        self.stylesheets = Some(Arc::new(stylesheets));
        self
    }

    pub fn config(&self) -> &AssetflowConfig {
        &self.config
    }

    fn debounce(&self) -> Duration {
        Duration::from_millis(u64::from(self.config.watch.debounce_ms))
    }

    /// Stylesheet configuration, resolved and summarized on first call.
    pub fn stylesheets(&mut self) -> Result<Arc<ScssConfig>, FatalError> {
        if let Some(config) = &self.stylesheets {
            return Ok(Arc::clone(config));
        }
        let scss = &self.config.scss;
        let config = ScssConfig::resolve(&ScssOptions {
            dev: self.flags.dev,
            style: scss.style.clone(),
            sourcemap: self.flags.sourcemap,
            scssdir: scss.scssdir.clone(),
            cssdir: scss.cssdir.clone(),
            files: scss.files.clone(),
            browsers: self.config.autoprefixer.browsers.clone(),
        })?;
        config.log_summary();
        let config = Arc::new(config);
        self.stylesheets = Some(Arc::clone(&config));
        Ok(config)
    }

    /// Run one task.
    ///
    /// Watch returns once the watcher is registered; Reload blocks while
    /// its server runs.
    pub fn run(&mut self, task: Task) -> Result<(), FatalError> {
        debug!("Starting {}", task.name());
        match task {
            Task::Clean => {
                let config = self.stylesheets()?;
                clean(&config, &self.reporter);
            }
            Task::Compile => {
                let config = self.stylesheets()?;
                compile_all(&config, &self.reporter);
            }
            Task::Watch => {
                let config = self.stylesheets()?;
                let handle = watch_stylesheets(config, self.debounce(), self.reporter)?;
                self.watches.push(handle);
            }
            Task::Reload => {
                run_livereload(
                    &self.config.livereload,
                    self.stylesheets.as_deref(),
                    self.debounce(),
                    self.reporter,
                )?;
            }
            Task::ImageOptimize => {
                run_imagemin(&self.config.imagemin, &self.reporter)?;
            }
            Task::ScriptMinify => {
                let options = MinifyJsOptions::resolve(&self.config.minifyjs, self.flags.sourcemap)?;
                run_minifyjs(&options, &self.reporter);
            }
        }
        Ok(())
    }

    /// Run every task of `pipeline` in order, stopping at the first fatal
    /// error.
    pub fn run_pipeline(&mut self, pipeline: Pipeline) -> Result<(), FatalError> {
        for task in pipeline.tasks() {
            self.run(*task)?;
        }
        Ok(())
    }

    /// Number of active watch subscriptions.
    pub fn active_watches(&self) -> usize {
        self.watches.len()
    }

    /// Block on the active watches until they end.
    pub fn wait(mut self) {
        for handle in self.watches.drain(..) {
            handle.wait();
        }
    }

    /// Cancel every active watch.
    pub fn cancel(mut self) {
        for handle in self.watches.drain(..) {
            handle.cancel();
        }
    }
}
