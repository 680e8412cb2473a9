//! Configuration module for the asset build pipeline
//!
//! Provides types, parsing and loading for build configuration files.

pub mod loader;
pub mod schema;

pub use loader::{
    load_config, load_config_from, merge_cli_overrides, parse_config, project_root, resolve_path,
    CliOverrides, ConfigError,
};
pub use schema::*;
