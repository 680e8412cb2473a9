//! Build pipeline: one complete invocation.
//!
//! Loads the build configuration, builds the component registry, loads the
//! previous manifest, runs the engine and saves the new manifest next to the
//! configuration file. Failures in any of these steps are fatal; failures of
//! individual assets are not.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::build::engine::default_jobs;
use crate::build::{
    manifest_path, BuildEngine, BuildLog, BuildResult, CancellationToken, JsonManifestStore,
    ManifestError, ManifestStore, TracingLog,
};
use crate::config::{
    load_config_from, merge_cli_overrides, project_root, resolve_path, CliOverrides, ConfigError,
};
use crate::content::{BuiltinComponents, ComponentSource, DescriptorRegistry, RegistryError};
use crate::fs::{FileSystem, PhysicalFileSystem};

/// Error that aborts a build pass.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Build pipeline for executing builds.
pub struct BuildPipeline {
    config_path: PathBuf,
    overrides: CliOverrides,
    fs: Arc<dyn FileSystem>,
    log: Arc<dyn BuildLog>,
    components: Box<dyn ComponentSource>,
    cancel: CancellationToken,
    unix: bool,
}

impl BuildPipeline {
    /// Create a pipeline for the configuration at `config_path`, using the
    /// real file system and the built-in components.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            overrides: CliOverrides::default(),
            fs: Arc::new(PhysicalFileSystem::new()),
            log: Arc::new(TracingLog::default()),
            components: Box::new(BuiltinComponents),
            cancel: CancellationToken::new(),
            unix: cfg!(unix),
        }
    }

    pub fn with_overrides(mut self, overrides: CliOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_log(mut self, log: Arc<dyn BuildLog>) -> Self {
        self.log = log;
        self
    }

    /// Replace the component list the registry is built from.
    pub fn with_components(mut self, components: impl ComponentSource + 'static) -> Self {
        self.components = Box::new(components);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_unix(mut self, unix: bool) -> Self {
        self.unix = unix;
        self
    }

    /// Location of the manifest this pipeline reads and writes.
    pub fn manifest_path(&self) -> PathBuf {
        manifest_path(&self.config_path)
    }

    /// Run the build.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let mut config = load_config_from(self.fs.as_ref(), &self.config_path)?;
        merge_cli_overrides(&mut config, &self.overrides);

        let root = project_root(&self.config_path);
        let input_dir = resolve_path(root, &config.build.input);
        let output_dir = resolve_path(root, &config.build.output);
        tracing::debug!(
            config = %self.config_path.display(),
            input = %input_dir.display(),
            output = %output_dir.display(),
            "resolved build directories"
        );

        let registry = DescriptorRegistry::from_source(self.components.as_ref())?;

        let store = JsonManifestStore::new(Arc::clone(&self.fs));
        let manifest_path = self.manifest_path();
        let previous = if config.build.incremental { store.load(&manifest_path)? } else { None };

        let engine = BuildEngine::new(registry, Arc::clone(&self.fs))
            .with_log(Arc::clone(&self.log))
            .with_input_dir(input_dir)
            .with_output_dir(output_dir)
            .with_incremental(config.build.incremental)
            .with_jobs(config.build.jobs.unwrap_or_else(default_jobs))
            .with_unix(self.unix)
            .with_cancellation(self.cancel.clone());

        let result = engine.run(&config.assets, previous.as_ref())?;
        store.save(&manifest_path, &result.manifest)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{AssetStatus, MemoryLog, Verbosity};
    use crate::content::{Component, StaticComponents};
    use crate::content::builtin::{PassthroughProcessor, TextImporter};
    use crate::fs::MemoryFileSystem;
    use std::path::Path;

    const CONFIG: &str = r#"
[build]
input = "content"
output = "build"

[[assets]]
path = "**/*.txt"
"#;

    fn project() -> Arc<MemoryFileSystem> {
        Arc::new(
            MemoryFileSystem::new()
                .with_file("/p/forge.toml", CONFIG)
                .with_file("/p/content/hello.txt", "HELLO WORLD"),
        )
    }

    fn pipeline(fs: &Arc<MemoryFileSystem>) -> BuildPipeline {
        BuildPipeline::new("/p/forge.toml").with_fs(fs.clone()).with_unix(true)
    }

    #[test]
    fn test_build_writes_output_and_manifest() {
        let fs = project();
        let result = pipeline(&fs).build().unwrap();

        assert_eq!(result.success_count(), 1);
        assert_eq!(fs.read_to_string("/p/build/hello.txt").as_deref(), Some("HELLO WORLD"));
        assert!(fs.read_to_string("/p/forge.toml.manifest").unwrap().contains("/p/content/hello.txt"));
    }

    #[test]
    fn test_second_build_skips() {
        let fs = project();
        let log = Arc::new(MemoryLog::new(Verbosity::Normal));
        pipeline(&fs).build().unwrap();

        let result = pipeline(&fs).with_log(log.clone()).build().unwrap();
        assert_eq!(result.skipped_count(), 1);
        assert!(log.contains("Skipped /p/content/hello.txt (no change)"));
    }

    #[test]
    fn test_rebuild_override_ignores_manifest() {
        let fs = project();
        pipeline(&fs).build().unwrap();

        let overrides = CliOverrides { rebuild: true, ..Default::default() };
        let result = pipeline(&fs).with_overrides(overrides).build().unwrap();
        assert_eq!(result.item("/p/content/hello.txt").unwrap().status, AssetStatus::Success);
    }

    #[test]
    fn test_output_override() {
        let fs = project();
        let overrides = CliOverrides { output: Some(PathBuf::from("/dist")), ..Default::default() };
        pipeline(&fs).with_overrides(overrides).build().unwrap();
        assert_eq!(fs.read_to_string("/dist/hello.txt").as_deref(), Some("HELLO WORLD"));
    }

    #[test]
    fn test_output_override_after_build_rebuilds() {
        let fs = project();
        pipeline(&fs).build().unwrap();

        let overrides = CliOverrides { output: Some(PathBuf::from("/dist")), ..Default::default() };
        let result = pipeline(&fs).with_overrides(overrides).build().unwrap();
        assert_eq!(result.success_count(), 1);
        assert_eq!(fs.read_to_string("/dist/hello.txt").as_deref(), Some("HELLO WORLD"));
        assert!(fs.read_to_string("/p/forge.toml.manifest").unwrap().contains("/dist/hello.txt"));
    }

    #[test]
    fn test_processor_edit_in_config_rebuilds() {
        let fs = project();
        pipeline(&fs).build().unwrap();

        fs.insert("/p/forge.toml", format!("{}processor = \"reverse\"\n", CONFIG));
        let result = pipeline(&fs).build().unwrap();
        assert_eq!(result.success_count(), 1);
        assert_eq!(fs.read_to_string("/p/build/hello.txt").as_deref(), Some("DLROW OLLEH"));
    }

    #[test]
    fn test_missing_config_is_fatal() {
        let fs = Arc::new(MemoryFileSystem::new());
        let err = pipeline(&fs).build().unwrap_err();
        assert!(matches!(err, BuildError::Config(ConfigError::Io(_))));
    }

    #[test]
    fn test_registry_error_is_fatal() {
        let fs = project();
        let components = StaticComponents::new(vec![
            Component::importer(TextImporter),
            Component::processor(PassthroughProcessor),
            Component::importer(TextImporter),
        ]);
        let err = pipeline(&fs).with_components(components).build().unwrap_err();
        assert!(matches!(err, BuildError::Registry(RegistryError::DuplicateExtension { .. })));
        assert!(fs.read_to_string("/p/build/hello.txt").is_none());
    }

    #[test]
    fn test_corrupt_manifest_is_fatal() {
        let fs = project();
        fs.insert("/p/forge.toml.manifest", "garbage");
        let err = pipeline(&fs).build().unwrap_err();
        assert!(matches!(err, BuildError::Manifest(ManifestError::Json(_))));
        assert_eq!(pipeline(&fs).manifest_path(), Path::new("/p/forge.toml.manifest"));
    }
}
