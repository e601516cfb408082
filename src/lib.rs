//! Assetflow - front-end asset build tool
//!
//! This library provides functionality to:
//! - Compile SCSS entry files to vendor-prefixed CSS, with optional source maps
//! - Watch stylesheet sources and recompile on change
//! - Notify browsers through a LiveReload server when watched files change
//! - Optimize images in place and minify scripts
//!
//! The [`tasks::TaskSequencer`] ties these together; [`cli::run`] is the
//! command-line entry point.

pub mod cli;
pub mod config;
pub mod imagemin;
pub mod items;
pub mod livereload;
pub mod logging;
pub mod minifyjs;
pub mod paths;
pub mod report;
pub mod scss;
pub mod tasks;
pub mod watch;
