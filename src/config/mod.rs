//! Configuration module for assetflow
//!
//! Provides types and parsing for the optional `assetflow.toml` project
//! configuration, and merging of command-line overrides.

pub mod loader;
pub mod schema;

pub use loader::{
    default_config, find_config, find_config_from, load_config, merge_cli_overrides, CliOverrides,
    ConfigError, CONFIG_FILE_NAME,
};
pub use schema::*;
