//! Configuration schema types for build configuration files.
//!
//! Defines the structure and validation rules of a `forge.toml`:
//!
//! ```toml
//! [build]
//! input = "content"
//! output = "build"
//! incremental = true
//! jobs = 4
//!
//! [[assets]]
//! path = "**/*.txt"
//! processor = "reverse"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directories and pass options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSection {
    /// Directory asset patterns are resolved against
    #[serde(default = "default_input")]
    pub input: PathBuf,
    /// Directory outputs are written to
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Skip assets unchanged since the last pass
    #[serde(default = "default_incremental")]
    pub incremental: bool,
    /// Number of parallel workers (defaults to available parallelism)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            incremental: default_incremental(),
            jobs: None,
        }
    }
}

fn default_input() -> PathBuf {
    PathBuf::from("content")
}

fn default_output() -> PathBuf {
    PathBuf::from("build")
}

fn default_incremental() -> bool {
    true
}

/// One entry of the asset list: a path or glob pattern and an optional
/// processor overriding the importer's default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDefinition {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
}

impl AssetDefinition {
    pub fn new(path: &str) -> Self {
        Self { path: path.to_string(), processor: None }
    }

    pub fn with_processor(mut self, processor: &str) -> Self {
        self.processor = Some(processor.to_string());
        self
    }
}

/// Complete build configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfiguration {
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub assets: Vec<AssetDefinition>,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "assets[2].path")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' {}", self.field, self.message)
    }
}

impl BuildConfiguration {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.assets.is_empty() {
            errors.push(ConfigValidationError {
                field: "assets".to_string(),
                message: "must contain at least one asset definition".to_string(),
            });
        }

        for (i, asset) in self.assets.iter().enumerate() {
            if asset.path.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("assets[{}].path", i),
                    message: "must be a non-empty path or pattern".to_string(),
                });
            }
            if asset.processor.as_deref().is_some_and(|p| p.trim().is_empty()) {
                errors.push(ConfigValidationError {
                    field: format!("assets[{}].processor", i),
                    message: "must be a non-empty processor name when given".to_string(),
                });
            }
        }

        if self.build.jobs == Some(0) {
            errors.push(ConfigValidationError {
                field: "build.jobs".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if self.build.input.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "build.input".to_string(),
                message: "must be a non-empty path".to_string(),
            });
        }

        if self.build.output.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "build.output".to_string(),
                message: "must be a non-empty path".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parse() {
        let config: BuildConfiguration = toml::from_str(
            r#"
[[assets]]
path = "**/*.txt"
"#,
        )
        .unwrap();
        assert_eq!(config.build, BuildSection::default());
        assert_eq!(config.assets, vec![AssetDefinition::new("**/*.txt")]);
        assert!(config.is_valid());
    }

    #[test]
    fn test_full_config_parse() {
        let config: BuildConfiguration = toml::from_str(
            r#"
[build]
input = "src"
output = "dist"
incremental = false
jobs = 2

[[assets]]
path = "a.txt"
processor = "reverse"

[[assets]]
path = "**/*.bin"
"#,
        )
        .unwrap();
        assert_eq!(config.build.input, PathBuf::from("src"));
        assert_eq!(config.build.output, PathBuf::from("dist"));
        assert!(!config.build.incremental);
        assert_eq!(config.build.jobs, Some(2));
        assert_eq!(config.assets[0].processor.as_deref(), Some("reverse"));
        assert_eq!(config.assets[1].processor, None);
    }

    #[test]
    fn test_validation_errors() {
        let config = BuildConfiguration {
            build: BuildSection { jobs: Some(0), ..Default::default() },
            assets: vec![AssetDefinition::new(" "), AssetDefinition::new("a.txt").with_processor("")],
        };
        let fields: Vec<_> = config.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["assets[0].path", "assets[1].processor", "build.jobs"]);
    }

    #[test]
    fn test_empty_asset_list_invalid() {
        let config = BuildConfiguration::default();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "'assets' must contain at least one asset definition");
    }
}
