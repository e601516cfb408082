//! Stylesheet clean and compile
//!
//! Compile runs each entry through the Sass compiler, then vendor-prefixes
//! and prints it with lightningcss, optionally writing a source map next to
//! the output.

use grass::{Options, OutputStyle};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::Targets;
use parcel_sourcemap::SourceMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use super::config::{CompileStyle, ScssConfig};
use crate::paths::{map_file_pattern, remove_matching, to_slash};
use crate::report::ErrorReporter;

/// Error compiling a single entry file. Never fatal.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Sass compilation failed
    #[error("{}: {message}", .file.display())]
    Sass { file: PathBuf, message: String },
    /// The compiled CSS could not be parsed or printed
    #[error("{}: {message}", .file.display())]
    Css { file: PathBuf, message: String },
    /// Source map serialization failed
    #[error("{}: source map: {message}", .file.display())]
    SourceMap { file: PathBuf, message: String },
    /// Writing output failed
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Files produced for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledEntry {
    pub css: PathBuf,
    pub map: Option<PathBuf>,
}

/// Outcome of compiling every entry once.
#[derive(Debug, Default)]
pub struct CompileSummary {
    pub compiled: Vec<CompiledEntry>,
    pub failed: Vec<PathBuf>,
    pub duration: Duration,
}

impl CompileSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete every `*.map` file in the CSS directory.
///
/// Synchronous so it always finishes before the following compile starts.
/// No map files is not an error.
pub fn clean(config: &ScssConfig, reporter: &ErrorReporter) -> Vec<PathBuf> {
    let pattern = map_file_pattern(config.css_dir());
    info!("Removing maps {}", to_slash(&pattern));
    let removed = remove_matching(&pattern);
    for path in &removed {
        debug!("Removed {}", path.display());
    }
    reporter.done("scss-clean");
    removed
}

/// Compile every entry in configured order.
///
/// A failing entry is reported through `reporter` and the remaining
/// entries are still compiled.
pub fn compile_all(config: &ScssConfig, reporter: &ErrorReporter) -> CompileSummary {
    let start = Instant::now();
    let mut summary = CompileSummary::default();

    for entry in config.entry_paths() {
        match compile_entry(config, &entry) {
            Ok(compiled) => {
                debug!("Compiled {} -> {}", entry.display(), compiled.css.display());
                summary.compiled.push(compiled);
            }
            Err(e) => {
                reporter.error(&e);
                summary.failed.push(entry);
            }
        }
    }

    summary.duration = start.elapsed();
    reporter.done("scss-preprocess");
    summary
}

/// Compile a single entry file into the CSS directory.
pub fn compile_entry(config: &ScssConfig, entry: &Path) -> Result<CompiledEntry, CompileError> {
    let css = compile_sass(entry, config.scss_dir(), config.style())?;

    let stem = entry.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let css_name = format!("{}.css", stem);
    let css_path = config.css_dir().join(&css_name);
    let map_name = format!("{}.map", css_name);

    let targets = Targets::from(config.browsers().unwrap_or_default());
    let printed = prefix_and_print(
        &css,
        entry,
        targets,
        config.style().is_minified(),
        config.sourcemap(),
        config.css_dir(),
    )?;

    let mut code = printed.code;
    let map_path = match printed.map {
        Some(map) => {
            code.push_str(&source_map_comment(&map_name, config.style()));
            let path = config.css_dir().join(&map_name);
            write_file(&path, map.as_bytes())?;
            Some(path)
        }
        None => None,
    };
    write_file(&css_path, code.as_bytes())?;

    Ok(CompiledEntry { css: css_path, map: map_path })
}

/// Printed CSS and, when requested, its source map JSON.
#[derive(Debug)]
pub struct PrintedCss {
    pub code: String,
    pub map: Option<String>,
}

/// Run the Sass compiler on `entry`, resolving imports against `load_dir`.
pub fn compile_sass(entry: &Path, load_dir: &Path, style: CompileStyle) -> Result<String, CompileError> {
    let output_style = if style.is_minified() { OutputStyle::Compressed } else { OutputStyle::Expanded };
    let options = Options::default().load_path(load_dir).style(output_style);

    grass::from_path(entry, &options)
        .map_err(|e| CompileError::Sass { file: entry.to_path_buf(), message: e.to_string() })
}

/// Vendor-prefix `css` for `targets` and print it.
pub fn prefix_and_print(
    css: &str,
    entry: &Path,
    targets: Targets,
    minify: bool,
    sourcemap: bool,
    project_root: &Path,
) -> Result<PrintedCss, CompileError> {
    let filename = entry.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let css_error =
        |message: String| CompileError::Css { file: entry.to_path_buf(), message };

    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions { filename: filename.clone(), ..ParserOptions::default() },
    )
    .map_err(|e| css_error(e.to_string()))?;

    sheet
        .minify(MinifyOptions { targets, ..MinifyOptions::default() })
        .map_err(|e| css_error(e.to_string()))?;

    let root = to_slash(project_root);
    let mut source_map = if sourcemap {
        let mut map = SourceMap::new(&root);
        let index = map.add_source(&filename);
        map.set_source_content(index as usize, css).map_err(|e| CompileError::SourceMap {
            file: entry.to_path_buf(),
            message: format!("{:?}", e),
        })?;
        Some(map)
    } else {
        None
    };

    let printed = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            source_map: source_map.as_mut(),
            project_root: Some(&root),
            ..PrinterOptions::default()
        })
        .map_err(|e| css_error(e.to_string()))?;

    let map = match source_map.as_mut() {
        Some(map) => Some(map.to_json(None).map_err(|e| CompileError::SourceMap {
            file: entry.to_path_buf(),
            message: format!("{:?}", e),
        })?),
        None => None,
    };

    Ok(PrintedCss { code: printed.code, map })
}

fn source_map_comment(map_name: &str, style: CompileStyle) -> String {
    let sep = if style.is_minified() { "" } else { "\n" };
    format!("{}/*# sourceMappingURL={} */\n", sep, map_name)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), CompileError> {
    fs::write(path, contents).map_err(|source| CompileError::Write { path: path.to_path_buf(), source })
}
