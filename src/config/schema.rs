//! Configuration schema types for `assetflow.toml`
//!
//! Every section is optional. Values act as defaults that command-line
//! flags override.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stylesheet section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScssSection {
    /// SCSS source directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scssdir: Option<PathBuf>,
    /// Compiled CSS output directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cssdir: Option<PathBuf>,
    /// Entry files, relative to `scssdir`
    #[serde(default)]
    pub files: Vec<String>,
    /// Output style: compact, compressed, expanded or nested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// Vendor prefixing targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoprefixerConfig {
    /// Browserslist queries
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
}

impl Default for AutoprefixerConfig {
    fn default() -> Self {
        Self { browsers: default_browsers() }
    }
}

/// Browser targets used when nothing is configured.
pub fn default_browsers() -> Vec<String> {
    [
        "last 2 versions",
        "safari 5",
        "ie 7",
        "ie 8",
        "ie 9",
        "opera 12.1",
        "ios 6",
        "android 4",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Watch mode configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

/// Live-reload server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveReloadConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind; browser extensions expect 35729
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directories whose changes trigger a reload
    #[serde(default)]
    pub dirs: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    35729
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), dirs: Vec::new() }
    }
}

/// Image optimization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageminConfig {
    /// Directories to optimize in place
    #[serde(default)]
    pub dirs: Vec<String>,
    /// Lossy JPEG re-encode quality (1-100); unset keeps JPEG pixel data
    /// untouched and only strips metadata
    #[serde(default)]
    pub jpeg_quality: Option<u8>,
    /// Drop an SVG `viewBox` that only repeats `width`/`height`
    #[serde(default = "default_true")]
    pub remove_view_box: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ImageminConfig {
    fn default() -> Self {
        Self { dirs: Vec::new(), jpeg_quality: None, remove_view_box: true }
    }
}

/// Script minification configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinifyJsConfig {
    /// Source directory (default: working directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<PathBuf>,
    /// Destination directory (default: working directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<PathBuf>,
    /// Merged output file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Complete assetflow.toml configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetflowConfig {
    #[serde(default)]
    pub scss: ScssSection,
    #[serde(default)]
    pub autoprefixer: AutoprefixerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub livereload: LiveReloadConfig,
    #[serde(default)]
    pub imagemin: ImageminConfig,
    #[serde(default)]
    pub minifyjs: MinifyJsConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "livereload.port")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "assetflow.toml: '{}' {}", self.field, self.message)
    }
}

impl AssetflowConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.autoprefixer.browsers.iter().all(|b| b.trim().is_empty()) {
            errors.push(ConfigValidationError {
                field: "autoprefixer.browsers".to_string(),
                message: "must contain at least one query".to_string(),
            });
        }

        if self.livereload.port == 0 {
            errors.push(ConfigValidationError {
                field: "livereload.port".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if self.livereload.host.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "livereload.host".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        if self.imagemin.jpeg_quality.is_some_and(|q| !(1..=100).contains(&q)) {
            errors.push(ConfigValidationError {
                field: "imagemin.jpeg_quality".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }

        errors
    }
}
