//! Script minification
//!
//! Minifies every `*.js` file in the source directory into the destination
//! directory, either one output per input or concatenated into one merged
//! file.

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_sourcemap::{ConcatSourceMapBuilder, SourceMap};
use oxc_span::SourceType;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::MinifyJsConfig;
use crate::logging::{field, section};
use crate::paths::{files_with_extension, is_valid_path, map_file_pattern, remove_matching, PathKind};
use crate::report::{ErrorReporter, FatalError};

/// Extension appended to a merged file name that lacks `.js`.
pub const MINIFIED_SUFFIX: &str = ".min.js";

/// Error minifying one script. Never fatal.
#[derive(Debug, Error)]
pub enum MinifyError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {message}", .file.display())]
    Parse { file: PathBuf, message: String },
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Merged output name for `name`: `None` when empty, `name` when it already
/// ends in `.js`, otherwise `name` + `.min.js`.
///
/// # Examples
///
/// ```
/// use assetflow::minifyjs::merged_file_name;
///
/// assert_eq!(merged_file_name("app"), Some("app.min.js".to_string()));
/// assert_eq!(merged_file_name("bundle.js"), Some("bundle.js".to_string()));
/// assert_eq!(merged_file_name(" "), None);
/// ```
pub fn merged_file_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        None
    } else if name.ends_with(".js") {
        Some(name.to_string())
    } else {
        Some(format!("{}{}", name, MINIFIED_SUFFIX))
    }
}

/// Validated script minification settings.
#[derive(Debug, Clone)]
pub struct MinifyJsOptions {
    pub src: PathBuf,
    pub dest: PathBuf,
    /// Merged output file name; `None` minifies each file on its own
    pub file: Option<String>,
    pub sourcemap: bool,
}

impl MinifyJsOptions {
    /// Default both directories to the working directory and validate them.
    pub fn resolve(config: &MinifyJsConfig, sourcemap: bool) -> Result<Self, FatalError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let pick = |dir: &Option<PathBuf>| match dir {
            Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
            _ => cwd.clone(),
        };

        let src = pick(&config.src);
        if !is_valid_path(&src, PathKind::Directory) {
            return Err(FatalError::InvalidDirectory { label: "Minifyjs source", path: src });
        }
        let dest = pick(&config.dest);
        if !is_valid_path(&dest, PathKind::Directory) {
            return Err(FatalError::InvalidDirectory { label: "Minifyjs destination", path: dest });
        }

        let file = config.file.as_deref().and_then(merged_file_name);
        Ok(Self { src, dest, file, sourcemap })
    }

    pub fn log_summary(&self) {
        section(" minifyjs-config > ");
        field("Source Dir", self.src.display());
        field("Destination Dir", self.dest.display());
        field("Ugly File", self.file.as_deref().unwrap_or("Not provided"));
        field("Source Map", if self.sourcemap { "Generate" } else { "Remove" });
        section(" < minifyjs-config ");
    }

    /// Scripts to minify, sorted, excluding the merged output itself.
    pub fn sources(&self) -> Vec<PathBuf> {
        let output = self.file.as_ref().map(|name| self.dest.join(name));
        files_with_extension(&self.src, "js")
            .into_iter()
            .filter(|path| Some(path) != output.as_ref())
            .collect()
    }
}

/// Minified code and, when requested, its source map.
#[derive(Debug, Clone)]
pub struct MinifiedScript {
    pub code: String,
    pub map: Option<SourceMap>,
}

/// Outcome of one minification pass.
#[derive(Debug, Default)]
pub struct MinifySummary {
    pub written: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Run the ScriptMinify operation.
pub fn run_minifyjs(options: &MinifyJsOptions, reporter: &ErrorReporter) -> MinifySummary {
    options.log_summary();

    for path in remove_matching(&map_file_pattern(&options.dest)) {
        debug!("Removed {}", path.display());
    }

    let sources = options.sources();
    let mut summary = MinifySummary::default();
    if sources.is_empty() {
        warn!("No scripts found in {}", options.src.display());
    } else {
        match &options.file {
            Some(name) => minify_merged(options, name, &sources, reporter, &mut summary),
            None => {
                for source in &sources {
                    let name = source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                    let result = read_script(source)
                        .and_then(|code| write_minified(options, &name, source, &code));
                    record(result, source, reporter, &mut summary);
                }
            }
        }
    }

    info!("Minified {} script(s)", summary.written.len());
    reporter.done("minifyjs");
    summary
}

fn minify_merged(
    options: &MinifyJsOptions,
    name: &str,
    sources: &[PathBuf],
    reporter: &ErrorReporter,
    summary: &mut MinifySummary,
) {
    let mut parts = Vec::new();
    for source in sources {
        match read_script(source).and_then(|code| minify_script(&code, source, options.sourcemap)) {
            Ok(minified) => parts.push(minified),
            Err(e) => {
                reporter.error(&e);
                summary.failed.push(source.clone());
            }
        }
    }
    if parts.is_empty() {
        return;
    }
    let output = options.dest.join(name);
    let result = write_output(options, name, concat_scripts(parts));
    record(result, &output, reporter, summary);
}

/// Join minified scripts, each followed by a newline, shifting every
/// source map by the lines already written.
pub fn concat_scripts(parts: Vec<MinifiedScript>) -> MinifiedScript {
    let mut code = String::new();
    let mut maps = Vec::new();
    for part in parts {
        let line_offset = code.matches('\n').count() as u32;
        code.push_str(&part.code);
        if !code.ends_with('\n') {
            code.push('\n');
        }
        if let Some(map) = part.map {
            maps.push((map, line_offset));
        }
    }
    let map = (!maps.is_empty()).then(|| {
        let maps: Vec<(&SourceMap, u32)> = maps.iter().map(|(map, offset)| (map, *offset)).collect();
        ConcatSourceMapBuilder::from_sourcemaps(&maps).into_sourcemap()
    });
    MinifiedScript { code, map }
}

fn record(result: Result<PathBuf, MinifyError>, source: &Path, reporter: &ErrorReporter, summary: &mut MinifySummary) {
    match result {
        Ok(path) => {
            debug!("Minified {} -> {}", source.display(), path.display());
            summary.written.push(path);
        }
        Err(e) => {
            reporter.error(&e);
            summary.failed.push(source.to_path_buf());
        }
    }
}

fn read_script(path: &Path) -> Result<String, MinifyError> {
    fs::read_to_string(path).map_err(|source| MinifyError::Read { path: path.to_path_buf(), source })
}

fn write_minified(options: &MinifyJsOptions, name: &str, source_path: &Path, code: &str) -> Result<PathBuf, MinifyError> {
    write_output(options, name, minify_script(code, source_path, options.sourcemap)?)
}

fn write_output(options: &MinifyJsOptions, name: &str, minified: MinifiedScript) -> Result<PathBuf, MinifyError> {
    let output = options.dest.join(name);
    let mut code = minified.code;

    if let Some(map) = minified.map {
        let map_name = format!("{}.map", name);
        let map_path = options.dest.join(&map_name);
        fs::write(&map_path, map.to_json_string())
            .map_err(|source| MinifyError::Write { path: map_path.clone(), source })?;
        if !code.ends_with('\n') {
            code.push('\n');
        }
        code.push_str(&format!("//# sourceMappingURL={}\n", map_name));
    }

    fs::write(&output, code).map_err(|source| MinifyError::Write { path: output.clone(), source })?;
    Ok(output)
}

/// Parse, compress, mangle and print a script.
pub fn minify_script(source: &str, source_path: &Path, sourcemap: bool) -> Result<MinifiedScript, MinifyError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        let message = parsed.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
        return Err(MinifyError::Parse { file: source_path.to_path_buf(), message });
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);

    let printed = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            source_map_path: sourcemap.then(|| source_path.to_path_buf()),
            ..CodegenOptions::default()
        })
        .with_symbol_table(minified.symbol_table)
        .build(&program);

    Ok(MinifiedScript { code: printed.code, map: printed.map })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ADD: &str = "function add(first, second) {\n  // sum\n  return first + second;\n}\nconsole.log(add(1, 2));\n";

    fn options(src: &Path, dest: &Path, file: Option<&str>, sourcemap: bool) -> MinifyJsOptions {
        MinifyJsOptions {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            file: file.and_then(merged_file_name),
            sourcemap,
        }
    }

    fn dirs() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("js");
        let dest = temp.path().join("dist");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dest).unwrap();
        (temp, src, dest)
    }

    #[test]
    fn test_merged_file_name() {
        assert_eq!(merged_file_name(""), None);
        assert_eq!(merged_file_name("app"), Some("app.min.js".into()));
        assert_eq!(merged_file_name("app.min"), Some("app.min.min.js".into()));
        assert_eq!(merged_file_name("all.js"), Some("all.js".into()));
    }

    #[test]
    fn test_minify_script_shrinks() {
        let out = minify_script(ADD, Path::new("add.js"), false).unwrap();
        assert!(out.code.len() < ADD.len());
        assert!(!out.code.contains("// sum"));
        assert!(out.map.is_none());
    }

    #[test]
    fn test_minify_script_parse_error() {
        let result = minify_script("function (", Path::new("bad.js"), false);
        assert!(matches!(result, Err(MinifyError::Parse { .. })));
    }

    #[test]
    fn test_minify_script_with_map() {
        let out = minify_script(ADD, Path::new("add.js"), true).unwrap();
        assert!(out.map.unwrap().to_json_string().contains("\"mappings\""));
    }

    #[test]
    fn test_per_file_preserves_names() {
        let (_temp, src, dest) = dirs();
        fs::write(src.join("a.js"), ADD).unwrap();
        fs::write(src.join("b.js"), "var answer = 40 + 2;\n").unwrap();
        fs::write(src.join("notes.txt"), "skip").unwrap();
        fs::write(dest.join("old.js.map"), "{}").unwrap();

        let summary = run_minifyjs(&options(&src, &dest, None, false), &ErrorReporter::default());
        assert_eq!(summary.written, vec![dest.join("a.js"), dest.join("b.js")]);
        assert!(!dest.join("old.js.map").exists());
        assert!(!dest.join("notes.txt").exists());
    }

    #[test]
    fn test_merged_with_sourcemap() {
        let (_temp, src, dest) = dirs();
        fs::write(src.join("a.js"), ADD).unwrap();
        fs::write(src.join("b.js"), "var answer = 40 + 2;\n").unwrap();

        let summary = run_minifyjs(&options(&src, &dest, Some("app"), true), &ErrorReporter::default());
        assert_eq!(summary.written, vec![dest.join("app.min.js")]);
        let code = fs::read_to_string(dest.join("app.min.js")).unwrap();
        assert!(code.ends_with("//# sourceMappingURL=app.min.js.map\n"));

        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dest.join("app.min.js.map")).unwrap()).unwrap();
        let sources: Vec<&str> = map["sources"].as_array().unwrap().iter().filter_map(|s| s.as_str()).collect();
        assert_eq!(sources.len(), 2);
        assert!(sources[0].ends_with("a.js"));
        assert!(sources[1].ends_with("b.js"));
        assert!(!sources.iter().any(|s| s.ends_with("app.min.js")));
    }

    #[test]
    fn test_concat_shifts_second_map() {
        let first = minify_script("var a = 1;\n", Path::new("a.js"), true).unwrap();
        let second = minify_script("var b = 2;\n", Path::new("b.js"), true).unwrap();
        let merged = concat_scripts(vec![first, second]);

        assert_eq!(merged.code.lines().count(), 2);
        let json: serde_json::Value = serde_json::from_str(&merged.map.unwrap().to_json_string()).unwrap();
        assert_eq!(json["sources"], serde_json::json!(["a.js", "b.js"]));
        assert!(json["mappings"].as_str().unwrap().contains(';'));
    }

    #[test]
    fn test_merged_skips_unparsable_input() {
        let (_temp, src, dest) = dirs();
        fs::write(src.join("a.js"), "function (").unwrap();
        fs::write(src.join("b.js"), ADD).unwrap();

        let summary = run_minifyjs(&options(&src, &dest, Some("app"), false), &ErrorReporter::default());
        assert_eq!(summary.failed, vec![src.join("a.js")]);
        assert_eq!(summary.written, vec![dest.join("app.min.js")]);
        assert!(fs::read_to_string(dest.join("app.min.js")).unwrap().contains("console.log"));
    }

    #[test]
    fn test_bad_script_is_not_fatal() {
        let (_temp, src, dest) = dirs();
        fs::write(src.join("a.js"), "function (").unwrap();
        fs::write(src.join("b.js"), ADD).unwrap();

        let summary = run_minifyjs(&options(&src, &dest, None, false), &ErrorReporter::default());
        assert_eq!(summary.failed, vec![src.join("a.js")]);
        assert_eq!(summary.written, vec![dest.join("b.js")]);
    }

    #[test]
    fn test_merged_output_not_read_back() {
        let (_temp, src, _) = dirs();
        fs::write(src.join("a.js"), ADD).unwrap();
        fs::write(src.join("app.min.js"), "old").unwrap();

        let opts = options(&src, &src, Some("app"), false);
        assert_eq!(opts.sources(), vec![src.join("a.js")]);
    }

    #[test]
    fn test_resolve_invalid_source_is_fatal() {
        let config = MinifyJsConfig { src: Some("/definitely/not/here".into()), ..Default::default() };
        let result = MinifyJsOptions::resolve(&config, false);
        assert!(matches!(result, Err(FatalError::InvalidDirectory { label: "Minifyjs source", .. })));
    }
}
