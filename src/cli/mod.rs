//! Command-line interface implementation
//!
//! Parses flags, loads the optional `assetflow.toml`, and dispatches the
//! requested command to the [`TaskSequencer`]. [`run`] is the only place
//! that turns a fatal error into a process exit status.

mod usage;

pub use usage::{show_usage, show_welcome};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

use crate::config::{find_config, load_config, merge_cli_overrides, AssetflowConfig, CliOverrides};
use crate::logging::init_logging;
use crate::report::{ErrorReporter, FatalError};
use crate::tasks::{Pipeline, RunFlags, Task, TaskSequencer};

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;

/// Assetflow - SCSS compile/watch, autoprefixing, image and script
/// minification with live reload
#[derive(Debug, Parser)]
#[command(name = "assetflow")]
#[command(about = "Assetflow - SCSS compile/watch, autoprefixing, image and script minification with live reload")]
#[command(version, disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub options: GlobalOptions,

    /// Print version
    #[arg(long, action = clap::ArgAction::Version)]
    pub version: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Clean maps and compile SCSS, then exit
    Scss,
    /// Remove *.map files from the CSS directory
    Scssclean,
    /// Minify images in place
    Imagemin,
    /// Watch directories and reload connected browsers
    Livereload,
    /// Minify JS files
    Minifyjs,
    /// Display usage information
    Usage,
}

/// Flags accepted before or after any command.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalOptions {
    /// Beep on completion of important task
    #[arg(short = 'B', long, global = true)]
    pub beep: bool,

    /// Use development options for building
    #[arg(short = 'D', long, global = true)]
    pub dev: bool,

    /// Log detailed messages
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// Create sourcemap (*.map) files
    #[arg(short = 'm', long, global = true)]
    pub sourcemap: bool,

    /// SCSS output style: compact, compressed, expanded or nested
    #[arg(short = 't', long, global = true, value_name = "STYLE")]
    pub style: Option<String>,

    /// SCSS directory to watch and process
    #[arg(short = 's', long, global = true, value_name = "DIR")]
    pub scssdir: Option<PathBuf>,

    /// CSS directory for SCSS output
    #[arg(short = 'c', long, global = true, value_name = "DIR")]
    pub cssdir: Option<PathBuf>,

    /// SCSS files to preprocess, comma-delimited
    #[arg(short = 'e', long, global = true, value_name = "FILES")]
    pub scssfiles: Option<String>,

    /// Directories to watch for live reload, comma-delimited
    #[arg(short = 'r', long, global = true, value_name = "DIRS")]
    pub livereload: Option<String>,

    /// Image directories to minify, comma-delimited
    #[arg(short = 'i', long, global = true, value_name = "DIRS")]
    pub imagemin: Option<String>,

    /// Minify JS source directory
    #[arg(short = 'j', long = "minifyjss", global = true, value_name = "DIR")]
    pub minifyjs_src: Option<PathBuf>,

    /// Minify JS destination directory
    #[arg(short = 'k', long = "minifyjsd", global = true, value_name = "DIR")]
    pub minifyjs_dest: Option<PathBuf>,

    /// Minify JS destination file if to be merged
    #[arg(short = 'l', long = "minifyjsf", global = true, value_name = "FILE")]
    pub minifyjs_file: Option<String>,

    /// Path to assetflow.toml (default: search upwards from the working directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl GlobalOptions {
    /// Values that take precedence over assetflow.toml.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            scssdir: self.scssdir.clone(),
            cssdir: self.cssdir.clone(),
            scssfiles: self.scssfiles.clone(),
            style: self.style.clone(),
            livereload: self.livereload.clone(),
            imagemin: self.imagemin.clone(),
            minifyjs_src: self.minifyjs_src.clone(),
            minifyjs_dest: self.minifyjs_dest.clone(),
            minifyjs_file: self.minifyjs_file.clone(),
        }
    }

    pub fn flags(&self) -> RunFlags {
        RunFlags { dev: self.dev, sourcemap: self.sourcemap }
    }
}

/// Load assetflow.toml (if any) and apply command-line overrides.
pub fn project_config(options: &GlobalOptions) -> Result<AssetflowConfig, FatalError> {
    let path = options.config.clone().or_else(find_config);
    match &path {
        Some(path) => debug!("Using config: {}", path.display()),
        None => debug!("No assetflow.toml found, using defaults"),
    }
    let mut config = load_config(path.as_deref())?;
    merge_cli_overrides(&mut config, &options.overrides());
    Ok(config)
}

/// Execute a parsed command line.
///
/// Long-running commands block here until the process is interrupted.
pub fn execute(cli: Cli, reporter: ErrorReporter) -> Result<(), FatalError> {
    if cli.command == Some(Commands::Usage) {
        show_usage();
        return Ok(());
    }

    let config = project_config(&cli.options)?;
    let mut tasks = TaskSequencer::new(config, cli.options.flags(), reporter);

    match cli.command {
        None => {
            tasks.run_pipeline(Pipeline::Default)?;
            // Reload returns at once when it has nothing to watch; keep
            // the stylesheet watch alive.
            tasks.wait();
        }
        Some(Commands::Scss) => tasks.run_pipeline(Pipeline::CompileOnly)?,
        Some(Commands::Scssclean) => tasks.run(Task::Clean)?,
        Some(Commands::Imagemin) => tasks.run(Task::ImageOptimize)?,
        Some(Commands::Livereload) => tasks.run(Task::Reload)?,
        Some(Commands::Minifyjs) => tasks.run(Task::ScriptMinify)?,
        Some(Commands::Usage) => show_usage(),
    }
    Ok(())
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.options.verbose);
    show_welcome();

    let reporter = ErrorReporter::new(cli.options.beep);
    match execute(cli, reporter) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            reporter.fatal(&e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
