//! Configuration loading for build configuration files.
//!
//! Provides functions to load, validate and merge configuration.

use super::schema::BuildConfiguration;
use crate::fs::{FileSystem, PhysicalFileSystem};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override input directory
    pub input: Option<PathBuf>,
    /// Override output directory
    pub output: Option<PathBuf>,
    /// Ignore the previous manifest and rebuild everything
    pub rebuild: bool,
    /// Number of parallel jobs
    pub jobs: Option<usize>,
}

/// Load configuration from a file on disk.
///
/// # Example
/// ```ignore
/// let config = load_config(Path::new("project/forge.toml"))?;
/// ```
pub fn load_config(path: &Path) -> Result<BuildConfiguration, ConfigError> {
    load_config_from(&PhysicalFileSystem::new(), path)
}

/// Load configuration through a file-system handle.
pub fn load_config_from(fs: &dyn FileSystem, path: &Path) -> Result<BuildConfiguration, ConfigError> {
    let bytes = fs.read(path)?;
    let contents = String::from_utf8(bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    parse_config(&contents)
}

/// Parse and validate configuration text.
pub fn parse_config(contents: &str) -> Result<BuildConfiguration, ConfigError> {
    let config: BuildConfiguration = toml::from_str(contents)?;

    // Validate the config
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values. Override paths
/// are kept as given; callers resolve them against the working directory.
pub fn merge_cli_overrides(config: &mut BuildConfiguration, overrides: &CliOverrides) {
    if let Some(ref input) = overrides.input {
        config.build.input = input.clone();
    }

    if let Some(ref output) = overrides.output {
        config.build.output = output.clone();
    }

    if overrides.rebuild {
        config.build.incremental = false;
    }

    if let Some(jobs) = overrides.jobs {
        config.build.jobs = Some(jobs.max(1));
    }
}

/// Get the project root directory from a config file path.
///
/// Returns the parent directory of the config file, or `.` for a bare
/// file name.
pub fn project_root(config_path: &Path) -> &Path {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
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
