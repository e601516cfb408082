//! Assetflow - SCSS compile/watch, autoprefixing, image and script minification with live reload

use std::process::ExitCode;

use assetflow::cli;

fn main() -> ExitCode {
    cli::run()
}
