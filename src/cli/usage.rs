//! Welcome and usage text

use tracing::info;

use crate::logging::section;
use crate::report::USAGE_HINT;

const USAGE_LINES: &[&str] = &[
    "Usage: assetflow [command] [options]",
    "Commands:",
    "  [default]          Execute scssclean and scss, watch SCSS files for changes,",
    "                     then start livereload",
    "  imagemin           Minify images",
    "  livereload         Watch CSS, JS and template directories and reload the browser,",
    "                     requires a LiveReload browser extension",
    "                     More info on extensions at http://livereload.com/extensions/",
    "  scss               Execute SCSS preprocessor",
    "  scssclean          Remove *.map files",
    "  minifyjs           Minify JS files",
    "  usage              Display usage information",
    "Options:",
    "  General:",
    "  -B, --beep         Beep on completion of important task          [boolean]",
    "  -D, --dev          Use development options for building          [boolean]",
    "  -V, --verbose      Log detailed messages                         [boolean]",
    "      --config       Path to assetflow.toml",
    "  SCSS:",
    "  -s, --scssdir      SCSS directory to watch and process, use with -c",
    "  -c, --cssdir       CSS directory for SCSS output, use with -s",
    "  -e, --scssfiles    SCSS files to preprocess, comma-delimited",
    "  -t, --style        SCSS output style, compact|compressed|expanded|nested",
    "  -m, --sourcemap    Create sourcemap (*.map) files                [boolean]",
    "  Live Reload:",
    "  -r, --livereload   Directories to watch for livereload, comma-delimited",
    "  Imagemin:",
    "  -i, --imagemin     Image directories to minify, comma-delimited",
    "  Minify JS:",
    "  -j, --minifyjss    Minify JS source directory",
    "  -k, --minifyjsd    Minify JS destination directory",
    "  -l, --minifyjsf    Minify JS destination file if to be merged",
    "Examples:",
    "  assetflow -s scss",
    "  assetflow scss -D -c web/css",
    "  assetflow -BD -s theme/scss -r theme/templates,theme/js",
    "  assetflow minifyjs -j js -k dist -l app",
];

/// Log the tool name, version and how to get help.
pub fn show_welcome() {
    info!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("{}", env!("CARGO_PKG_DESCRIPTION"));
    info!("{}, Ctrl+C to terminate", USAGE_HINT);
}

/// Log the usage text between section banners.
pub fn show_usage() {
    section(" usage > ");
    for line in USAGE_LINES {
        info!("{}", line);
    }
    section(" < usage ");
}
