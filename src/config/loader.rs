//! Configuration loading and discovery for `assetflow.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::AssetflowConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "assetflow.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse assetflow.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// Command-line values that override config file values.
///
/// `None` (or an empty string from the command line) leaves the config
/// value untouched.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub scssdir: Option<PathBuf>,
    pub cssdir: Option<PathBuf>,
    /// Comma-delimited entry files
    pub scssfiles: Option<String>,
    pub style: Option<String>,
    /// Comma-delimited live-reload directories
    pub livereload: Option<String>,
    /// Comma-delimited image directories
    pub imagemin: Option<String>,
    pub minifyjs_src: Option<PathBuf>,
    pub minifyjs_dest: Option<PathBuf>,
    pub minifyjs_file: Option<String>,
}

/// Find assetflow.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find assetflow.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an explicit path, or discover it.
///
/// Relative directories in the file are resolved against the directory
/// containing it. Without a file, returns [`default_config`].
pub fn load_config(path: Option<&Path>) -> Result<AssetflowConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<AssetflowConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let mut config: AssetflowConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    if let Some(root) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        rebase_paths(&mut config, root);
    }

    Ok(config)
}

/// Configuration used when no assetflow.toml is found.
pub fn default_config() -> AssetflowConfig {
    AssetflowConfig::default()
}

/// Resolve every relative directory in `config` against `root`.
fn rebase_paths(config: &mut AssetflowConfig, root: &Path) {
    let rebase = |p: &mut Option<PathBuf>| {
        if let Some(path) = p.as_mut() {
            *path = resolve_path(root, path);
        }
    };
    rebase(&mut config.scss.scssdir);
    rebase(&mut config.scss.cssdir);
    rebase(&mut config.minifyjs.src);
    rebase(&mut config.minifyjs.dest);

    for dir in config.livereload.dirs.iter_mut().chain(config.imagemin.dirs.iter_mut()) {
        *dir = resolve_path(root, Path::new(dir.as_str())).display().to_string();
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut AssetflowConfig, overrides: &CliOverrides) {
    if let Some(dir) = non_empty_path(&overrides.scssdir) {
        config.scss.scssdir = Some(dir);
    }
    if let Some(dir) = non_empty_path(&overrides.cssdir) {
        config.scss.cssdir = Some(dir);
    }
    if let Some(files) = non_empty(&overrides.scssfiles) {
        config.scss.files = vec![files];
    }
    if let Some(style) = non_empty(&overrides.style) {
        config.scss.style = Some(style);
    }
    if let Some(dirs) = non_empty(&overrides.livereload) {
        config.livereload.dirs = vec![dirs];
    }
    if let Some(dirs) = non_empty(&overrides.imagemin) {
        config.imagemin.dirs = vec![dirs];
    }
    if let Some(dir) = non_empty_path(&overrides.minifyjs_src) {
        config.minifyjs.src = Some(dir);
    }
    if let Some(dir) = non_empty_path(&overrides.minifyjs_dest) {
        config.minifyjs.dest = Some(dir);
    }
    if let Some(file) = non_empty(&overrides.minifyjs_file) {
        config.minifyjs.file = Some(file);
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

fn non_empty_path(value: &Option<PathBuf>) -> Option<PathBuf> {
    value.as_ref().filter(|p| !p.as_os_str().is_empty()).cloned()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
