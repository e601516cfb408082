//! Stylesheet task configuration
//!
//! Built once per run from flags and `assetflow.toml`, validated up front,
//! then passed by reference to the clean, compile and watch tasks.

use lightningcss::targets::Browsers;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::resolve::{resolve_pair, PairRules};
use crate::config::schema::default_browsers;
use crate::items::ItemList;
use crate::logging::{field, section};
use crate::paths::{is_valid_path, to_slash, PathKind};
use crate::report::FatalError;

/// Entry file compiled when none is configured.
pub const DEFAULT_ENTRY: &str = "style.scss";

/// Extension of files that trigger a recompile.
pub const SCSS_EXTENSION: &str = "scss";

/// Output style of compiled CSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStyle {
    Compact,
    Compressed,
    Expanded,
    Nested,
}

impl CompileStyle {
    /// Default style for the build mode.
    pub fn default_for(dev: bool) -> Self {
        if dev {
            CompileStyle::Expanded
        } else {
            CompileStyle::Compressed
        }
    }

    /// Whether output is minified.
    pub fn is_minified(&self) -> bool {
        matches!(self, CompileStyle::Compressed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompileStyle::Compact => "compact",
            CompileStyle::Compressed => "compressed",
            CompileStyle::Expanded => "expanded",
            CompileStyle::Nested => "nested",
        }
    }
}

impl fmt::Display for CompileStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompileStyle {
    type Err = FatalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(CompileStyle::Compact),
            "compressed" => Ok(CompileStyle::Compressed),
            "expanded" => Ok(CompileStyle::Expanded),
            "nested" => Ok(CompileStyle::Nested),
            _ => Err(FatalError::InvalidStyle(s.to_string())),
        }
    }
}

/// Unvalidated stylesheet settings, as collected from flags and config.
#[derive(Debug, Clone, Default)]
pub struct ScssOptions {
    /// Development build
    pub dev: bool,
    /// Style override; `None` picks the mode default
    pub style: Option<String>,
    /// Force source maps
    pub sourcemap: bool,
    pub scssdir: Option<PathBuf>,
    pub cssdir: Option<PathBuf>,
    /// Entry files, each possibly comma-delimited
    pub files: Vec<String>,
    /// Browserslist queries for vendor prefixing
    pub browsers: Vec<String>,
}

/// Validated stylesheet configuration.
#[derive(Debug, Clone)]
pub struct ScssConfig {
    dev: bool,
    scss_dir: PathBuf,
    css_dir: PathBuf,
    entries: Vec<String>,
    style: CompileStyle,
    sourcemap: bool,
    browsers: Option<Browsers>,
}

impl ScssConfig {
    /// Resolve directories, validate entries and style, and derive defaults.
    pub fn resolve(options: &ScssOptions) -> Result<Self, FatalError> {
        let pair = resolve_pair(
            options.scssdir.as_deref(),
            options.cssdir.as_deref(),
            &PairRules::stylesheets(),
        )?;

        let mut entries = ItemList::from_items(options.files.clone());
        if entries.is_empty() {
            entries.add(DEFAULT_ENTRY);
        }
        for entry in &entries {
            let path = pair.source.join(entry);
            if !is_valid_path(&path, PathKind::File) {
                return Err(FatalError::InvalidEntryFile(path));
            }
        }

        let style = match options.style.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(style) => style.parse()?,
            None => CompileStyle::default_for(options.dev),
        };

        let queries = if options.browsers.is_empty() { default_browsers() } else { options.browsers.clone() };
        let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
            .map_err(|e| FatalError::InvalidBrowsers(e.to_string()))?;

        Ok(Self {
            dev: options.dev,
            scss_dir: pair.source,
            css_dir: pair.output,
            entries: entries.items().to_vec(),
            style,
            sourcemap: options.sourcemap || options.dev,
            browsers,
        })
    }

    pub fn is_dev(&self) -> bool {
        self.dev
    }

    pub fn scss_dir(&self) -> &Path {
        &self.scss_dir
    }

    pub fn css_dir(&self) -> &Path {
        &self.css_dir
    }

    /// Entry file names, relative to [`scss_dir`](Self::scss_dir).
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Entry file paths in configured order.
    pub fn entry_paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| self.scss_dir.join(e)).collect()
    }

    pub fn style(&self) -> CompileStyle {
        self.style
    }

    pub fn sourcemap(&self) -> bool {
        self.sourcemap
    }

    pub fn browsers(&self) -> Option<Browsers> {
        self.browsers
    }

    /// `<scss_dir>/**/*.scss`, for display.
    pub fn watch_pattern(&self) -> String {
        to_slash(&self.scss_dir.join("**").join(format!("*.{}", SCSS_EXTENSION)))
    }

    /// `<css_dir>/*.css`, the compiled output watched for live reload.
    pub fn css_pattern(&self) -> String {
        to_slash(&self.css_dir.join("*.css"))
    }

    /// Log the configuration summary.
    pub fn log_summary(&self) {
        section(" scss-config > ");
        field("Build For", if self.dev { "Development" } else { "Production" });
        field("SCSS Dir", self.scss_dir.display());
        field("SCSS Files (Watch)", self.watch_pattern());
        field("SCSS Files (Process)", self.entries.join(","));
        field("CSS Dir", self.css_dir.display());
        field("Source Map", if self.sourcemap { "Generate" } else { "Remove" });
        field("CSS Style", self.style);
        section(" < scss-config ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let scss = temp.path().join("scss");
        fs::create_dir_all(&scss).unwrap();
        fs::create_dir_all(temp.path().join("css")).unwrap();
        fs::write(scss.join("style.scss"), "a { b: c; }").unwrap();
        (temp, scss)
    }

    #[test]
    fn test_style_parse_case_insensitive() {
        assert_eq!("Compressed".parse::<CompileStyle>().unwrap(), CompileStyle::Compressed);
        assert_eq!("NESTED".parse::<CompileStyle>().unwrap(), CompileStyle::Nested);
        assert_eq!("compact".parse::<CompileStyle>().unwrap(), CompileStyle::Compact);
        assert!(matches!("pretty".parse::<CompileStyle>(), Err(FatalError::InvalidStyle(s)) if s == "pretty"));
    }

    #[test]
    fn test_dev_defaults() {
        let (_temp, scss) = project();
        let config = ScssConfig::resolve(&ScssOptions {
            dev: true,
            scssdir: Some(scss),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.style(), CompileStyle::Expanded);
        assert!(config.sourcemap());
        assert!(config.is_dev());
    }

    #[test]
    fn test_production_defaults() {
        let (_temp, scss) = project();
        let config =
            ScssConfig::resolve(&ScssOptions { scssdir: Some(scss.clone()), ..Default::default() })
                .unwrap();
        assert_eq!(config.style(), CompileStyle::Compressed);
        assert!(!config.sourcemap());
        assert_eq!(config.entries(), [DEFAULT_ENTRY]);
        assert_eq!(config.entry_paths(), vec![scss.join(DEFAULT_ENTRY)]);
        assert!(config.browsers().is_some());
    }

    #[test]
    fn test_explicit_style_and_sourcemap() {
        let (_temp, scss) = project();
        let config = ScssConfig::resolve(&ScssOptions {
            style: Some("Nested".into()),
            sourcemap: true,
            scssdir: Some(scss),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.style(), CompileStyle::Nested);
        assert!(config.sourcemap());
    }

    #[test]
    fn test_invalid_style_rejected_in_both_modes() {
        let (_temp, scss) = project();
        for dev in [false, true] {
            let result = ScssConfig::resolve(&ScssOptions {
                dev,
                style: Some("fancy".into()),
                scssdir: Some(scss.clone()),
                ..Default::default()
            });
            assert!(matches!(result, Err(FatalError::InvalidStyle(_))));
        }
    }

    #[test]
    fn test_missing_entry_is_fatal() {
        let (_temp, scss) = project();
        let result = ScssConfig::resolve(&ScssOptions {
            scssdir: Some(scss.clone()),
            files: vec!["style.scss,missing.scss".into()],
            ..Default::default()
        });
        match result {
            Err(FatalError::InvalidEntryFile(path)) => assert_eq!(path, scss.join("missing.scss")),
            other => panic!("expected invalid entry, got {:?}", other),
        }
    }

    #[test]
    fn test_entries_deduplicated() {
        let (_temp, scss) = project();
        fs::write(scss.join("print.scss"), "").unwrap();
        let config = ScssConfig::resolve(&ScssOptions {
            scssdir: Some(scss),
            files: vec!["style.scss, print.scss".into(), "style.scss".into()],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.entries(), ["print.scss", "style.scss"]);
    }

    #[test]
    fn test_invalid_browsers() {
        let (_temp, scss) = project();
        let result = ScssConfig::resolve(&ScssOptions {
            scssdir: Some(scss),
            browsers: vec!["not a real query !!".into()],
            ..Default::default()
        });
        assert!(matches!(result, Err(FatalError::InvalidBrowsers(_))));
    }

    #[test]
    fn test_patterns() {
        let (_temp, scss) = project();
        let config =
            ScssConfig::resolve(&ScssOptions { scssdir: Some(scss), ..Default::default() }).unwrap();
        assert!(config.watch_pattern().ends_with("scss/**/*.scss"));
        assert!(config.css_pattern().ends_with("css/*.css"));
    }
}
